use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// The lifecycle events a scan alert can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    /// INSERT statements
    Create,
    /// DELETE statements
    Delete,
    /// Raw SQL run through the session's raw/exec path
    Raw,
    /// SELECT queries
    Select,
    /// UPDATE statements
    Update,
}

impl QueryKind {
    /// Every kind, in registration order.
    pub const ALL: [QueryKind; 5] = [
        QueryKind::Create,
        QueryKind::Delete,
        QueryKind::Raw,
        QueryKind::Select,
        QueryKind::Update,
    ];

    /// The name used in hook registration keys (`{name}_{kind}`).
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Create => "create",
            QueryKind::Delete => "delete",
            QueryKind::Raw => "raw",
            QueryKind::Select => "query",
            QueryKind::Update => "update",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives messages about scans that could not be completed.
#[derive(Clone)]
pub struct ErrorSink(Arc<dyn Fn(&str) + Send + Sync>);

impl ErrorSink {
    /// Wrap a callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Emit every message as a `tracing` warning (target `scanalert`).
    pub fn tracing() -> Self {
        Self::new(|message| tracing::warn!(target: "scanalert", "{message}"))
    }

    /// Print every message to stderr with a prefix.
    pub fn stderr(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(move |message| eprintln!("{prefix} {message}"))
    }

    /// Deliver a message.
    pub fn report(&self, message: &str) {
        (self.0)(message)
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorSink").field(&"<fn>").finish()
    }
}

/// Options for a scan alert.
///
/// `Default` is tailored for test suites: every query kind is watched, scans run
/// inline, and internal errors are logged through `tracing`.
#[derive(Debug, Clone)]
pub struct AlertOptions {
    /// Registration key prefix. Must be unique per session when registering several alerts.
    pub name: String,
    /// Run the scan in a detached task instead of blocking the originating call.
    pub async_scan: bool,
    /// Which lifecycle events to watch.
    pub query_kinds: BTreeSet<QueryKind>,
    /// Where internal failures go. `None` drops them.
    pub error_sink: Option<ErrorSink>,
}

impl AlertOptions {
    /// Options with the given name, every kind watched, synchronous, and no error sink.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            async_scan: false,
            query_kinds: QueryKind::ALL.into_iter().collect(),
            error_sink: None,
        }
    }

    /// Run scans in a detached task.
    pub fn async_scan(mut self, enabled: bool) -> Self {
        self.async_scan = enabled;
        self
    }

    /// Replace the set of watched kinds.
    pub fn with_query_kinds(mut self, kinds: impl IntoIterator<Item = QueryKind>) -> Self {
        self.query_kinds = kinds.into_iter().collect();
        self
    }

    /// Watch one more kind.
    pub fn watch(mut self, kind: QueryKind) -> Self {
        self.query_kinds.insert(kind);
        self
    }

    /// Stop watching a kind.
    pub fn ignore(mut self, kind: QueryKind) -> Self {
        self.query_kinds.remove(&kind);
        self
    }

    /// Set the error sink from a callback.
    pub fn with_error_sink<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.error_sink = Some(ErrorSink::new(f));
        self
    }

    /// Set the error sink.
    pub fn with_error_sink_value(mut self, sink: ErrorSink) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Drop internal errors silently.
    pub fn without_error_sink(mut self) -> Self {
        self.error_sink = None;
        self
    }

    /// Whether `kind` is watched.
    pub fn watches(&self, kind: QueryKind) -> bool {
        self.query_kinds.contains(&kind)
    }

    /// The registration key for one kind.
    pub fn hook_key(&self, kind: QueryKind) -> String {
        format!("{}_{}", self.name, kind.as_str())
    }

    pub(crate) fn report(&self, message: &str) {
        if let Some(sink) = &self.error_sink {
            sink.report(message);
        }
    }
}

impl Default for AlertOptions {
    fn default() -> Self {
        Self::new("scanalert").with_error_sink_value(ErrorSink::tracing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn defaults_watch_everything_synchronously() {
        let options = AlertOptions::default();
        assert_eq!(options.name, "scanalert");
        assert!(!options.async_scan);
        assert!(QueryKind::ALL.iter().all(|k| options.watches(*k)));
        assert!(options.error_sink.is_some());
    }

    #[test]
    fn hook_keys_use_kind_names() {
        let options = AlertOptions::new("alerts");
        assert_eq!(options.hook_key(QueryKind::Select), "alerts_query");
        assert_eq!(options.hook_key(QueryKind::Raw), "alerts_raw");
        assert_eq!(options.hook_key(QueryKind::Create), "alerts_create");
    }

    #[test]
    fn kind_selection() {
        let options = AlertOptions::new("a")
            .with_query_kinds([QueryKind::Select])
            .watch(QueryKind::Update)
            .ignore(QueryKind::Select);
        assert_eq!(
            options.query_kinds.iter().copied().collect::<Vec<_>>(),
            vec![QueryKind::Update]
        );
    }

    #[test]
    fn report_goes_to_sink_only_when_configured() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let options = AlertOptions::new("a")
            .with_error_sink(move |m| sink_seen.lock().unwrap().push(m.to_string()));

        options.report("boom");
        options.clone().without_error_sink().report("dropped");

        assert_eq!(*seen.lock().unwrap(), vec!["boom".to_string()]);
    }
}
