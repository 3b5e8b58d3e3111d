use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use commslog::{
    persist::{sqlite::SqliteLogDb, LogBackend},
    query::IndexQuery,
    record::LogRecord,
    types::{Direction, IndexKey, IndexName},
};

const SERVICES: [&str; 3] = ["Telephony", "SMS", "MMS"];
const TELS: [&str; 4] = ["+100", "+200", "+300", "+400"];

#[derive(Debug, Clone)]
enum Action {
    Put {
        id: u8,
        ts: i64,
        service: usize,
        tels: Vec<usize>,
    },
    Delete {
        id: u8,
    },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (0u8..30, 0i64..60, 0usize..SERVICES.len(), prop::collection::vec(0usize..TELS.len(), 0..3))
            .prop_map(|(id, ts, service, tels)| Action::Put { id, ts, service, tels }),
        1 => (0u8..30).prop_map(|id| Action::Delete { id }),
    ]
}

fn record(id: u8, ts: i64, service: usize, tels: &[usize]) -> LogRecord {
    let mut rec = LogRecord::new(format!("id-{id:02}"), SERVICES[service], ts);
    rec.tel = tels.iter().map(|t| TELS[*t].to_string()).collect();
    rec
}

fn scan_ids(db: &SqliteLogDb, query: &IndexQuery) -> Vec<String> {
    let range = query.key_range().expect("range");
    let mut out = Vec::new();
    db.scan_index(query.index(), &range, query.direction(), &mut |r| {
        out.push(r.id().to_string())
    })
    .expect("scan");
    out
}

proptest! {
    #[test]
    fn index_scans_match_full_scan_filtering(
        actions in prop::collection::vec(action_strategy(), 1..80),
        lower in prop::option::of(0i64..60),
        upper in prop::option::of(0i64..60),
        tel in 0usize..TELS.len(),
        tel_span in (0usize..TELS.len(), 0usize..TELS.len()),
        service in 0usize..SERVICES.len(),
    ) {
        let mut db = SqliteLogDb::open_in_memory(1).expect("open");
        let mut model = BTreeMap::<String, LogRecord>::new();

        for action in actions {
            match action {
                Action::Put { id, ts, service, tels } => {
                    let rec = record(id, ts, service, &tels);
                    db.put(&rec).expect("put");
                    model.insert(rec.id().to_string(), rec);
                }
                Action::Delete { id } => {
                    let id = format!("id-{id:02}");
                    db.delete(&id).expect("delete");
                    model.remove(&id);
                }
            }
        }

        let mut stored = Vec::new();
        db.scan(&mut |r| stored.push(r)).expect("scan");
        prop_assert_eq!(&stored, &model.values().cloned().collect::<Vec<_>>());

        if let (Some(l), Some(u)) = (lower, upper) {
            prop_assume!(l <= u);
        }
        let mut query = IndexQuery::new(IndexName::Timestamp);
        if let Some(l) = lower {
            query.set_lower(l);
        }
        if let Some(u) = upper {
            query.set_upper(u);
        }
        let range = query.key_range().expect("range");
        let mut expected: Vec<(i64, String)> = model
            .values()
            .filter(|r| range.contains(&IndexKey::Int(r.timestamp())))
            .map(|r| (r.timestamp(), r.id().to_string()))
            .collect();
        expected.sort();
        let mut expected_desc: Vec<String> = expected.into_iter().map(|(_, id)| id).collect();
        expected_desc.reverse();

        prop_assert_eq!(query.direction(), Direction::Prev);
        let desc = scan_ids(&db, &query);
        prop_assert_eq!(&desc, &expected_desc);

        query.invert_order();
        let mut asc = scan_ids(&db, &query);
        asc.reverse();
        prop_assert_eq!(&asc, &desc);

        let mut by_tel = IndexQuery::new(IndexName::Tel);
        by_tel.set_filter_value(TELS[tel]).invert_order();
        let expected_tel: Vec<String> = model
            .values()
            .filter(|r| r.tel.iter().any(|t| t == TELS[tel]))
            .map(|r| r.id().to_string())
            .collect();
        prop_assert_eq!(scan_ids(&db, &by_tel), expected_tel);

        // A record is yielded once for every distinct tel key inside the range.
        let (lo, hi) = (tel_span.0.min(tel_span.1), tel_span.0.max(tel_span.1));
        let mut tel_range = IndexQuery::new(IndexName::Tel);
        tel_range.set_lower(TELS[lo]).set_upper(TELS[hi]).invert_order();
        let mut expected_hits: Vec<(&str, String)> = model
            .values()
            .flat_map(|r| {
                r.tel
                    .iter()
                    .map(String::as_str)
                    .filter(|t| TELS[lo] <= *t && *t <= TELS[hi])
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(move |t| (t, r.id().to_string()))
            })
            .collect();
        expected_hits.sort();
        let expected_tel_range: Vec<String> =
            expected_hits.into_iter().map(|(_, id)| id).collect();
        prop_assert_eq!(scan_ids(&db, &tel_range), expected_tel_range);

        let mut by_service = IndexQuery::new(IndexName::Service);
        by_service.set_filter_value(SERVICES[service]).invert_order();
        let expected_service: Vec<String> = model
            .values()
            .filter(|r| r.service() == SERVICES[service])
            .map(|r| r.id().to_string())
            .collect();
        prop_assert_eq!(scan_ids(&db, &by_service), expected_service);
    }
}
