//! Assertion helpers for test suites that must not issue sequential scans.
//!
//! ```rust,ignore
//! let client = ObservedClient::new(pg_client);
//! let guard = scanalert::expect_no_sequential_scan(&client)?;
//!
//! client.query("SELECT * FROM vegetables WHERE name = $1", &[&"potato"]).await?;
//!
//! guard.assert_no_scans();
//! ```

use crate::error::ScanResult;
use crate::hook::LifecycleSource;
use crate::options::{AlertOptions, QueryKind};
use crate::scan::register_scan_alert;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Alert name used by [`expect_no_sequential_scan`].
pub const TESTING_ALERT_NAME: &str = "scanalert-testing";

#[derive(Debug, Default)]
struct Recorded {
    scans: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl Recorded {
    fn push(list: &Mutex<Vec<String>>, value: &str) {
        list.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value.to_string());
    }

    fn snapshot(list: &Mutex<Vec<String>>) -> Vec<String> {
        list.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Watch every statement on `source` and collect the ones that scan a whole table.
///
/// Scans run synchronously, so a violation is recorded by the time the
/// statement's call returns. Only one guard can be attached per source.
pub fn expect_no_sequential_scan<S>(source: &S) -> ScanResult<ScanAssertion>
where
    S: LifecycleSource + ?Sized,
{
    let recorded = Arc::new(Recorded::default());

    let errors = recorded.clone();
    let options = AlertOptions::new(TESTING_ALERT_NAME)
        .with_query_kinds(QueryKind::ALL)
        .async_scan(false)
        .with_error_sink(move |message| Recorded::push(&errors.errors, message));

    let scans = recorded.clone();
    register_scan_alert(source, options, move |sql: &str, _plan: &str| {
        Recorded::push(&scans.scans, sql)
    })?;

    Ok(ScanAssertion {
        recorded,
        strict: false,
        checked: AtomicBool::new(false),
    })
}

/// Deferred failure for sequential scans seen since the guard was created.
///
/// Dropping a guard that still holds unchecked violations panics, unless the
/// thread is already unwinding.
#[derive(Debug)]
pub struct ScanAssertion {
    recorded: Arc<Recorded>,
    strict: bool,
    checked: AtomicBool,
}

impl ScanAssertion {
    /// Also fail when a statement could not be explained.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// SQL of every statement that caused a sequential scan.
    pub fn scans(&self) -> Vec<String> {
        Recorded::snapshot(&self.recorded.scans)
    }

    /// Errors reported while scanning.
    pub fn errors(&self) -> Vec<String> {
        Recorded::snapshot(&self.recorded.errors)
    }

    /// Everything that fails this guard: scans, plus errors in strict mode.
    pub fn violations(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .scans()
            .into_iter()
            .map(|sql| format!("sequential scan: {sql}"))
            .collect();
        if self.strict {
            out.extend(self.errors().into_iter().map(|e| format!("scan error: {e}")));
        }
        out
    }

    /// Panic if any violation was recorded.
    pub fn assert_no_scans(&self) {
        self.checked.store(true, Ordering::SeqCst);
        let violations = self.violations();
        if !violations.is_empty() {
            panic!(
                "expected no sequential scans, found {}:\n  {}",
                violations.len(),
                violations.join("\n  ")
            );
        }
    }
}

impl Drop for ScanAssertion {
    fn drop(&mut self) {
        if std::thread::panicking() || self.checked.load(Ordering::SeqCst) {
            return;
        }
        let violations = self.violations();
        if !violations.is_empty() {
            panic!(
                "sequential scans were never checked:\n  {}",
                violations.join("\n  ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard(scans: &[&str], errors: &[&str]) -> ScanAssertion {
        let recorded = Arc::new(Recorded::default());
        for sql in scans {
            Recorded::push(&recorded.scans, sql);
        }
        for err in errors {
            Recorded::push(&recorded.errors, err);
        }
        ScanAssertion {
            recorded,
            strict: false,
            checked: AtomicBool::new(false),
        }
    }

    #[test]
    fn clean_guard_passes_and_drops_quietly() {
        let g = guard(&[], &["failed to run the EXPLAIN query: boom"]);
        g.assert_no_scans();
        assert_eq!(g.errors().len(), 1);
    }

    #[test]
    #[should_panic(expected = "sequential scan: SELECT * FROM fruits")]
    fn assert_reports_offending_sql() {
        guard(&["SELECT * FROM fruits"], &[]).assert_no_scans();
    }

    #[test]
    #[should_panic(expected = "scan error: failed to access DB object")]
    fn strict_fails_on_errors() {
        guard(&[], &["failed to access DB object: the session has been closed"])
            .strict()
            .assert_no_scans();
    }

    #[test]
    #[should_panic(expected = "sequential scans were never checked")]
    fn unchecked_violations_panic_on_drop() {
        let _g = guard(&["DELETE FROM fruits"], &[]);
    }

    #[test]
    fn violations_are_prefixed() {
        let g = guard(&["SELECT 1"], &["boom"]).strict();
        assert_eq!(
            g.violations(),
            vec!["sequential scan: SELECT 1", "scan error: boom"]
        );
        g.checked.store(true, Ordering::SeqCst);
    }
}
