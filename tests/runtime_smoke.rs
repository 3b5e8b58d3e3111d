use std::{sync::Arc, time::Duration};

use commslog::{
    core::ids::RandomIds,
    error::LogError,
    persist::{sqlite::SqliteLogDb, LogBackend, PersistError, PersistResult},
    query::KeyRange,
    record::LogRecord,
    runtime::{
        events::LogEvent,
        handle::{spawn_log_store, spawn_log_store_with, StoreConfig, StoreState},
    },
    types::{Direction, IndexName},
};

fn call(id: &str, ts: i64) -> LogRecord {
    let mut rec = LogRecord::new(id, "Telephony", ts);
    rec.record_type = Some("incoming".to_string());
    rec.tel = vec!["+34600000000".to_string()];
    rec
}

/// Fails puts of one poisoned id and delegates everything else.
struct PoisonedPuts {
    inner: SqliteLogDb,
    poisoned: &'static str,
}

impl LogBackend for PoisonedPuts {
    fn put(&mut self, record: &LogRecord) -> PersistResult<()> {
        if record.id() == self.poisoned {
            return Err(PersistError::InvalidVersion);
        }
        self.inner.put(record)
    }

    fn delete(&mut self, id: &str) -> PersistResult<()> {
        self.inner.delete(id)
    }

    fn get(&self, id: &str) -> PersistResult<Option<LogRecord>> {
        self.inner.get(id)
    }

    fn scan(&self, visit: &mut dyn FnMut(LogRecord)) -> PersistResult<()> {
        self.inner.scan(visit)
    }

    fn scan_index(
        &self,
        index: IndexName,
        range: &KeyRange,
        direction: Direction,
        visit: &mut dyn FnMut(LogRecord),
    ) -> PersistResult<()> {
        self.inner.scan_index(index, range, direction, visit)
    }

    fn delete_range(&mut self, index: IndexName, range: &KeyRange) -> PersistResult<usize> {
        self.inner.delete_range(index, range)
    }
}

#[tokio::test]
async fn put_get_all_upsert_and_delete() {
    let store = spawn_log_store(StoreConfig::in_memory());
    store.ready().await.expect("ready");
    assert_eq!(store.state(), StoreState::Ready);

    store.put(call("2", 2_000)).await.expect("put 2");
    store.put(call("1", 1_000)).await.expect("put 1");

    let all = store.get_all().await.expect("get_all");
    let ids: Vec<&str> = all.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    let mut updated = call("1", 1_000);
    updated.status = Some("missed".to_string());
    updated.title = Some("Ana".to_string());
    store.put(updated.clone()).await.expect("upsert");

    let all = store.get_all().await.expect("get_all");
    assert_eq!(all.len(), 2);
    assert_eq!(all.iter().filter(|r| r.id() == "1").count(), 1);
    assert_eq!(store.get("1").await.expect("get"), Some(updated));

    store.delete("1").await.expect("delete");
    store.delete("never-stored").await.expect("delete absent");
    let all = store.get_all().await.expect("get_all");
    assert!(all.iter().all(|r| r.id() != "1"));
    assert_eq!(store.get("1").await.expect("get"), None);

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn write_events_follow_command_order() {
    let store = spawn_log_store(StoreConfig::in_memory());
    let mut sub = store.subscribe();

    store.put(call("a", 1)).await.expect("put");
    store.delete("a").await.expect("delete");

    let mut seen = Vec::new();
    for _ in 0..2 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        seen.push(evt);
    }
    assert_eq!(
        seen,
        vec![
            LogEvent::Stored { id: "a".to_string() },
            LogEvent::Deleted { id: "a".to_string() },
        ]
    );

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn commands_sent_while_opening_are_served_once_ready() {
    let store = spawn_log_store_with(StoreConfig::in_memory(), Arc::new(RandomIds), |cfg| {
        std::thread::sleep(Duration::from_millis(150));
        let db = SqliteLogDb::open_in_memory(cfg.schema_version)?;
        Ok(Box::new(db) as Box<dyn LogBackend>)
    });
    assert_eq!(store.state(), StoreState::Opening);

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.put(call(&format!("q{i}"), i)).await })
        })
        .collect();
    for w in writers {
        w.await.expect("join").expect("put");
    }

    assert_eq!(store.state(), StoreState::Ready);
    assert_eq!(store.get_all().await.expect("get_all").len(), 8);
    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_open_reaches_every_waiting_and_later_caller() {
    let store = spawn_log_store_with(StoreConfig::in_memory(), Arc::new(RandomIds), |_| {
        std::thread::sleep(Duration::from_millis(100));
        Err(PersistError::InvalidVersion)
    });

    let waiters: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    store.ready().await
                } else {
                    store.get_all().await.map(|_| ())
                }
            })
        })
        .collect();

    let mut reasons = Vec::new();
    for w in waiters {
        match w.await.expect("join") {
            Err(LogError::Connection(reason)) => reasons.push(reason),
            other => panic!("expected connection error, got {other:?}"),
        }
    }
    reasons.dedup();
    assert_eq!(reasons.len(), 1);

    match store.put(call("late", 1)).await {
        Err(LogError::Connection(reason)) => assert_eq!(reason, reasons[0]),
        other => panic!("expected connection error, got {other:?}"),
    }
    assert!(matches!(store.state(), StoreState::Failed(_)));
}

#[tokio::test]
async fn unopenable_path_fails_instead_of_hanging() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let path = tmp.path().join("missing").join("logs.db");
    let store = spawn_log_store(StoreConfig::at(path));

    let res = tokio::time::timeout(Duration::from_secs(5), store.ready())
        .await
        .expect("settles");
    assert!(matches!(res, Err(LogError::Connection(_))));
}

#[tokio::test]
async fn failed_write_leaves_store_usable() {
    let store = spawn_log_store_with(StoreConfig::in_memory(), Arc::new(RandomIds), |cfg| {
        let inner = SqliteLogDb::open_in_memory(cfg.schema_version)?;
        Ok(Box::new(PoisonedPuts {
            inner,
            poisoned: "bad",
        }) as Box<dyn LogBackend>)
    });

    let err = store.put(call("bad", 1)).await.expect_err("poisoned put");
    assert!(matches!(err, LogError::Transaction(_)));

    store.put(call("good", 2)).await.expect("put after failure");
    assert_eq!(store.get_all().await.expect("get_all").len(), 1);
    assert_eq!(store.state(), StoreState::Ready);
    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shutdown_closes_every_handle() {
    let store = spawn_log_store(StoreConfig::in_memory());
    let other = store.clone();
    store.put(call("x", 1)).await.expect("put");

    store.shutdown().await.expect("shutdown");
    assert_eq!(other.state(), StoreState::Closed);
    assert!(matches!(other.put(call("y", 2)).await, Err(LogError::Closed)));
    assert!(matches!(other.ready().await, Err(LogError::Closed)));
}

#[test]
fn runtime_drops_while_handles_are_still_alive() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("runtime");
    let store = rt.block_on(async {
        let store = spawn_log_store(StoreConfig::in_memory());
        store.put(call("a", 1)).await.expect("put");
        store
    });
    let survivor = store.clone();

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        drop(rt);
        let _ = done_tx.send(());
    });
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("runtime drop returned");

    drop(store);
    drop(survivor);
}
