//! Index key extraction.

use hashbrown::HashSet;

use crate::{
    record::LogRecord,
    types::{IndexKey, IndexName},
};

/// Returns the keys `rec` contributes to `index`.
///
/// `contactId` and `tel` are multi-entry: every distinct element becomes one
/// key. Repeated elements are collapsed, first occurrence wins.
pub fn index_keys(rec: &LogRecord, index: IndexName) -> Vec<IndexKey> {
    match index {
        IndexName::ContactId => distinct_text(&rec.contact_id),
        IndexName::Service => vec![IndexKey::Text(rec.service().to_string())],
        IndexName::Timestamp => vec![IndexKey::Int(rec.timestamp())],
        IndexName::Tel => distinct_text(&rec.tel),
        IndexName::Type => rec
            .record_type
            .iter()
            .map(|t| IndexKey::Text(t.clone()))
            .collect(),
    }
}

/// Keys for every index, paired with the index they belong to.
pub fn all_index_keys(rec: &LogRecord) -> Vec<(IndexName, IndexKey)> {
    IndexName::ALL
        .iter()
        .flat_map(|index| {
            index_keys(rec, *index)
                .into_iter()
                .map(move |key| (*index, key))
        })
        .collect()
}

fn distinct_text(values: &[String]) -> Vec<IndexKey> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .map(|v| IndexKey::Text(v.clone()))
        .collect()
}
