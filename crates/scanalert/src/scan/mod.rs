//! Sequential-scan detection.
//!
//! A [`ScanAlerter`] subscribes to a [`LifecycleSource`](crate::LifecycleSource)
//! and, for every watched statement:
//! - inlines the bound parameters,
//! - runs the dialect's explain prefix + statement on the same session,
//! - joins the plan rows with newlines,
//! - calls its [`ScanAction`] when the dialect's scan marker shows up.
//!
//! # Example
//!
//! ```rust,ignore
//! use scanalert::{AlertOptions, ObservedClient, QueryKind, ScanAlerter, TracingAlert};
//!
//! let client = ObservedClient::new(pg_client);
//!
//! ScanAlerter::new(
//!     AlertOptions::new("missing-index")
//!         .with_query_kinds([QueryKind::Select, QueryKind::Update])
//!         .async_scan(true),
//!     TracingAlert::new(),
//! )
//! .register(&client)?;
//!
//! client.query("SELECT * FROM fruits WHERE name != $1", &[&"apple"]).await?;
//! ```

mod action;
mod alerter;


pub use action::{ScanAction, TracingAlert};
pub use alerter::{ScanAlerter, ScanOutcome, register_scan_alert};
