//! # scanalert
//!
//! Sequential-scan alerts for PostgreSQL (and MySQL-compatible) sessions.
//!
//! ## Features
//!
//! - **Plan checking**: every watched statement is re-run under `EXPLAIN` on the same session
//! - **Parameter inlining**: bound values are rendered as literals so the plan matches the real query
//! - **Per-kind filtering**: watch SELECT, INSERT, UPDATE, DELETE and raw SQL independently
//! - **Sync or detached**: block the caller on the explain round trip, or hand it to `tokio::spawn`
//! - **Pluggable actions**: any `Fn(&str, &str)` closure, or the built-in [`TracingAlert`]
//! - **Test guard**: [`expect_no_sequential_scan`] fails a test that scans a whole table
//!
//! ## Quick start
//!
//! ```ignore
//! use scanalert::{AlertOptions, ObservedClient, TracingAlert, register_scan_alert};
//!
//! let (pg, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls).await?;
//! tokio::spawn(connection);
//!
//! let client = ObservedClient::new(pg);
//! register_scan_alert(&client, AlertOptions::new("missing-index"), TracingAlert::new())?;
//!
//! // Logs a warning with the plan: `name` has no index.
//! client.query("SELECT * FROM fruits WHERE name != $1", &[&"apple"]).await?;
//! ```

pub mod client;
pub mod dialect;
pub mod error;
pub mod hook;
pub mod options;
pub mod param;
pub mod scan;
pub(crate) mod sql;
pub mod testing;

pub use client::GenericClient;
pub use dialect::{Dialect, DialectEntry, DialectTable, PlaceholderStyle};
pub use error::{OrmError, OrmResult, ScanError, ScanResult};
pub use hook::{
    ExplainExecutor, HookRegistry, LifecycleSource, ObservedClient, StatementEvent, StatementHook,
    StatementSnapshot, Subscription,
};
pub use options::{AlertOptions, ErrorSink, QueryKind};
pub use param::{SqlParam, interpolate};
pub use scan::{ScanAction, ScanAlerter, ScanOutcome, TracingAlert, register_scan_alert};
pub use testing::{ScanAssertion, expect_no_sequential_scan};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};
