use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot, watch},
    task::JoinError,
};
use tracing::{debug, error, info};

use crate::{
    core::ids::{IdGenerator, RandomIds},
    error::LogError,
    persist::{LogBackend, PersistError, PersistResult, sqlite::SqliteLogDb},
    query::{IndexQuery, KeyRange},
    record::LogRecord,
    types::{Direction, IndexName, LogId, Timestamp},
};

use super::events::LogEvent;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbLocation {
    /// SQLite file at the given path.
    File(PathBuf),
    /// Private in-memory database, gone on shutdown.
    Memory,
}

/// Store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database location.
    pub location: DbLocation,
    /// Schema version. Raising it wipes existing entries on open.
    pub schema_version: u32,
    /// Identifiers tried by [`LogStore::allocate_entry`] before giving up.
    pub max_id_attempts: u32,
    /// Commands buffered while the worker is busy or still opening.
    pub command_queue_bound: usize,
    /// Events retained for slow subscribers.
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: DbLocation::File(PathBuf::from("commslog.db")),
            schema_version: 1,
            max_id_attempts: 16,
            command_queue_bound: 256,
            event_capacity: 1024,
        }
    }
}

impl StoreConfig {
    /// Default settings on a file database at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DbLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Default settings on an in-memory database.
    pub fn in_memory() -> Self {
        Self {
            location: DbLocation::Memory,
            ..Self::default()
        }
    }
}

/// Connection lifecycle as seen by handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreState {
    /// The worker is opening or upgrading the database.
    Opening,
    /// Commands are being served.
    Ready,
    /// The open failed; carries the reason every caller receives.
    Failed(String),
    /// The connection was released.
    Closed,
}

/// Cloneable handle to the store worker that owns the database connection.
///
/// Commands are served one at a time in arrival order. Commands sent while
/// the database is still opening wait in the queue.
pub struct LogStore {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<LogEvent>,
    state_rx: watch::Receiver<StoreState>,
    ids: Arc<dyn IdGenerator>,
}

impl Clone for LogStore {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
            state_rx: self.state_rx.clone(),
            ids: Arc::clone(&self.ids),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, LogError>>;

enum Command {
    Put {
        record: LogRecord,
        resp: Reply<()>,
    },
    Delete {
        id: LogId,
        resp: Reply<()>,
    },
    Get {
        id: LogId,
        resp: Reply<Option<LogRecord>>,
    },
    GetAll {
        resp: Reply<Vec<LogRecord>>,
    },
    ScanIndex {
        index: IndexName,
        range: KeyRange,
        direction: Direction,
        resp: Reply<Vec<LogRecord>>,
    },
    DeleteRange {
        index: IndexName,
        range: KeyRange,
        resp: Reply<usize>,
    },
    Allocate {
        service: String,
        timestamp: Timestamp,
        resp: Reply<LogRecord>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

/// Opens the SQLite database described by `config`.
pub fn open_sqlite(config: &StoreConfig) -> PersistResult<Box<dyn LogBackend>> {
    let db = match &config.location {
        DbLocation::File(path) => SqliteLogDb::open(path, config.schema_version)?,
        DbLocation::Memory => SqliteLogDb::open_in_memory(config.schema_version)?,
    };
    Ok(Box::new(db))
}

/// Spawns a store over SQLite with random identifiers.
///
/// Must be called from within a Tokio runtime. The handle is returned
/// immediately in [`StoreState::Opening`].
pub fn spawn_log_store(config: StoreConfig) -> LogStore {
    spawn_log_store_with(config, Arc::new(RandomIds), open_sqlite)
}

/// Spawns a store with a custom identifier source and backend opener.
pub fn spawn_log_store_with<F>(config: StoreConfig, ids: Arc<dyn IdGenerator>, open: F) -> LogStore
where
    F: FnOnce(&StoreConfig) -> PersistResult<Box<dyn LogBackend>> + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<LogEvent>(config.event_capacity.max(1));
    let (state_tx, state_rx) = watch::channel(StoreState::Opening);

    let worker = Worker {
        max_id_attempts: config.max_id_attempts.max(1),
        ids: Arc::clone(&ids),
        events_tx: events_tx.clone(),
        state_tx,
    };
    tokio::spawn(worker.run(config, open, cmd_rx));

    LogStore {
        cmd_tx,
        events_tx,
        state_rx,
        ids,
    }
}

impl LogStore {
    /// Subscribes to write events.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events_tx.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StoreState {
        self.state_rx.borrow().clone()
    }

    /// Waits until the open settles.
    ///
    /// Returns at once when already settled. Any number of callers may wait;
    /// each is resolved once, with the same reason if the open failed.
    pub async fn ready(&self) -> Result<(), LogError> {
        let mut rx = self.state_rx.clone();
        let settled = rx
            .wait_for(|s| *s != StoreState::Opening)
            .await
            .map(|s| s.clone())
            .map_err(|_| self.unavailable())?;

        match settled {
            StoreState::Ready => Ok(()),
            StoreState::Failed(reason) => Err(LogError::Connection(reason)),
            StoreState::Opening | StoreState::Closed => Err(LogError::Closed),
        }
    }

    /// Inserts `record`, replacing any record with the same id.
    pub async fn put(&self, record: LogRecord) -> Result<(), LogError> {
        self.request(|resp| Command::Put { record, resp }).await
    }

    /// Deletes the record with `id`. Absent ids succeed.
    pub async fn delete(&self, id: impl Into<LogId>) -> Result<(), LogError> {
        let id = id.into();
        self.request(|resp| Command::Delete { id, resp }).await
    }

    /// Looks up one record by id.
    pub async fn get(&self, id: impl Into<LogId>) -> Result<Option<LogRecord>, LogError> {
        let id = id.into();
        self.request(|resp| Command::Get { id, resp }).await
    }

    /// Returns every record in primary key order.
    pub async fn get_all(&self) -> Result<Vec<LogRecord>, LogError> {
        self.request(|resp| Command::GetAll { resp }).await
    }

    /// Returns the records matched by `query`, in its scan order.
    pub async fn get_by_index(&self, query: &IndexQuery) -> Result<Vec<LogRecord>, LogError> {
        let range = query.key_range()?;
        let index = query.index();
        let direction = query.direction();
        self.request(|resp| Command::ScanIndex {
            index,
            range,
            direction,
            resp,
        })
        .await
    }

    /// Deletes every record matched by `query`, returning how many went.
    pub async fn delete_by_index(&self, query: &IndexQuery) -> Result<usize, LogError> {
        let range = query.key_range()?;
        let index = query.index();
        self.request(|resp| Command::DeleteRange { index, range, resp })
            .await
    }

    /// Returns a candidate identifier without checking the store.
    pub fn generate_id(&self) -> LogId {
        self.ids.next_id()
    }

    /// Returns a new record shell whose id is not taken in the store.
    ///
    /// Colliding ids are regenerated up to `max_id_attempts` times.
    pub async fn allocate_entry(
        &self,
        service: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<LogRecord, LogError> {
        let service = service.into();
        self.request(|resp| Command::Allocate {
            service,
            timestamp,
            resp,
        })
        .await
    }

    /// Closes the connection. Later calls on any clone fail with
    /// [`LogError::Closed`].
    pub async fn shutdown(&self) -> Result<(), LogError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, LogError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| self.unavailable())?;
        rx.await.map_err(|_| self.unavailable())?
    }

    // The worker is gone. A failed open drops every queued command, so those
    // callers learn the reason from the state channel.
    fn unavailable(&self) -> LogError {
        match &*self.state_rx.borrow() {
            StoreState::Failed(reason) => LogError::Connection(reason.clone()),
            _ => LogError::Closed,
        }
    }
}

type SharedBackend = Arc<Mutex<Box<dyn LogBackend>>>;

struct Worker {
    max_id_attempts: u32,
    ids: Arc<dyn IdGenerator>,
    events_tx: broadcast::Sender<LogEvent>,
    state_tx: watch::Sender<StoreState>,
}

impl Worker {
    async fn run<F>(self, config: StoreConfig, open: F, mut cmd_rx: mpsc::Receiver<Command>)
    where
        F: FnOnce(&StoreConfig) -> PersistResult<Box<dyn LogBackend>> + Send + 'static,
    {
        let opened = {
            let config = config.clone();
            tokio::task::spawn_blocking(move || open(&config)).await
        };
        let backend = match opened {
            Ok(Ok(backend)) => backend,
            Ok(Err(err)) => return self.fail(&config, err.to_string()),
            Err(err) => return self.fail(&config, format!("open task failed: {err}")),
        };

        info!(
            location = ?config.location,
            version = config.schema_version,
            "log database ready"
        );
        self.state_tx.send_replace(StoreState::Ready);

        let backend: SharedBackend = Arc::new(Mutex::new(backend));
        while let Some(cmd) = cmd_rx.recv().await {
            if let Command::Shutdown { resp } = cmd {
                let res = close_backend(backend).await;
                self.state_tx.send_replace(StoreState::Closed);
                info!("log database closed");
                let _ = resp.send(res);
                return;
            }
            self.handle_command(cmd, &backend).await;
        }

        if let Err(err) = close_backend(backend).await {
            error!(%err, "closing log database failed");
        }
        self.state_tx.send_replace(StoreState::Closed);
        info!("log database closed, all handles dropped");
    }

    fn fail(&self, config: &StoreConfig, reason: String) {
        error!(location = ?config.location, %reason, "cannot open log database");
        self.state_tx.send_replace(StoreState::Failed(reason));
    }

    async fn handle_command(&self, cmd: Command, backend: &SharedBackend) {
        match cmd {
            Command::Put { record, resp } => {
                debug!(id = record.id(), "put");
                let id = record.id().to_string();
                let res = with_backend(backend, move |db| {
                    db.put(&record).map_err(LogError::from)
                })
                .await;
                if res.is_ok() {
                    let _ = self.events_tx.send(LogEvent::Stored { id });
                }
                let _ = resp.send(res);
            }
            Command::Delete { id, resp } => {
                debug!(%id, "delete");
                let key = id.clone();
                let res = with_backend(backend, move |db| {
                    db.delete(&key).map_err(LogError::from)
                })
                .await;
                if res.is_ok() {
                    let _ = self.events_tx.send(LogEvent::Deleted { id });
                }
                let _ = resp.send(res);
            }
            Command::Get { id, resp } => {
                let res = with_backend(backend, move |db| db.get(&id).map_err(LogError::from)).await;
                let _ = resp.send(res);
            }
            Command::GetAll { resp } => {
                let res = with_backend(backend, |db| {
                    let mut out = Vec::new();
                    db.scan(&mut |rec| out.push(rec))?;
                    Ok(out)
                })
                .await;
                let _ = resp.send(res);
            }
            Command::ScanIndex {
                index,
                range,
                direction,
                resp,
            } => {
                debug!(%index, ?range, ?direction, "index scan");
                let res = with_backend(backend, move |db| {
                    let mut out = Vec::new();
                    db.scan_index(index, &range, direction, &mut |rec| out.push(rec))?;
                    Ok(out)
                })
                .await;
                let _ = resp.send(res);
            }
            Command::DeleteRange {
                index,
                range,
                resp,
            } => {
                let target = range.clone();
                let res = with_backend(backend, move |db| {
                    db.delete_range(index, &target).map_err(LogError::from)
                })
                .await;
                if let Ok(removed) = res {
                    debug!(%index, ?range, removed, "range delete");
                    let _ = self.events_tx.send(LogEvent::Cleared { index, removed });
                }
                let _ = resp.send(res);
            }
            Command::Allocate {
                service,
                timestamp,
                resp,
            } => {
                let ids = Arc::clone(&self.ids);
                let max_attempts = self.max_id_attempts;
                let res = with_backend(backend, move |db| {
                    allocate(&*db, ids.as_ref(), max_attempts, service, timestamp)
                })
                .await;
                let _ = resp.send(res);
            }
            Command::Shutdown { resp } => {
                let _ = resp.send(Ok(()));
            }
        }
    }
}

// Backend calls run on the blocking pool; the worker task only awaits them.
async fn with_backend<T, F>(backend: &SharedBackend, call: F) -> Result<T, LogError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn LogBackend) -> Result<T, LogError> + Send + 'static,
{
    let backend = Arc::clone(backend);
    tokio::task::spawn_blocking(move || {
        let mut db = backend.blocking_lock();
        call(&mut **db)
    })
    .await
    .map_err(join_error)?
}

async fn close_backend(backend: SharedBackend) -> Result<(), LogError> {
    let Ok(backend) = Arc::try_unwrap(backend) else {
        // A call still holds the connection; it closes when that call drops it.
        return Ok(());
    };
    let backend = backend.into_inner();
    tokio::task::spawn_blocking(move || backend.close())
        .await
        .map_err(join_error)?
        .map_err(LogError::from)
}

fn join_error(err: JoinError) -> LogError {
    LogError::Transaction(PersistError::Message(format!("join error: {err}")))
}

fn allocate(
    backend: &dyn LogBackend,
    ids: &dyn IdGenerator,
    max_attempts: u32,
    service: String,
    timestamp: Timestamp,
) -> Result<LogRecord, LogError> {
    for attempt in 1..=max_attempts {
        let id = ids.next_id();
        if !backend.contains(&id)? {
            return Ok(LogRecord::new(id, service, timestamp));
        }
        debug!(%id, attempt, "generated log id already taken");
    }
    Err(LogError::IdentifierSpaceExhausted {
        attempts: max_attempts,
    })
}
