//! Client-side communications log backed by an embedded SQLite database.
//!
//! # Examples
//!
//! Building a range query with [`query::IndexQuery`]:
//! ```
//! use commslog::{
//!     query::{IndexQuery, KeyRange},
//!     types::{IndexKey, IndexName},
//! };
//!
//! let mut query = IndexQuery::new(IndexName::Timestamp);
//! query.set_lower(1_000_i64).set_upper(2_000_i64);
//! assert_eq!(
//!     query.key_range().expect("range"),
//!     KeyRange::Bound { lower: IndexKey::Int(1_000), upper: IndexKey::Int(2_000) },
//! );
//! ```
//!
//! Storing and finding entries through the manager:
//! ```no_run
//! use commslog::{
//!     manager::{LogFilter, LogManager},
//!     runtime::handle::{spawn_log_store, StoreConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = spawn_log_store(StoreConfig::at("commslog.db"));
//! let manager = LogManager::new(store.clone());
//!
//! let mut entry = store.allocate_entry("Telephony", 1_000).await.expect("allocate");
//! entry.record_type = Some("incoming".to_string());
//! entry.tel = vec!["+34600000000".to_string()];
//! manager.put(Some(entry)).await.expect("put");
//!
//! let calls = manager
//!     .find(&LogFilter { service: Some("Telephony".to_string()), ..LogFilter::default() })
//!     .await
//!     .expect("find");
//! assert_eq!(calls.len(), 1);
//! store.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Index key extraction and identifier generation.
pub mod core;
/// Error type returned by the store and manager.
pub mod error;
/// Filter-driven facade for application code.
pub mod manager;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Index query builder and key ranges.
pub mod query;
/// Communication log record.
pub mod record;
/// Store handle, worker and events.
pub mod runtime;
/// Shared primitive types and enums.
pub mod types;
