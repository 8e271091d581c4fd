use crate::dialect::Dialect;
use crate::error::{ScanError, ScanResult};
use crate::options::QueryKind;
use crate::param::{SqlParam, interpolate, render_params};
use std::sync::{Arc, Weak};

/// An owned copy of a statement that just ran.
///
/// Parameters are rendered to SQL literals when the snapshot is taken, so the
/// snapshot stays valid no matter what happens to the caller's values afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementSnapshot {
    /// Lifecycle event the statement belongs to.
    pub kind: QueryKind,
    /// SQL text as executed, placeholders included.
    pub sql: String,
    /// Bound parameters rendered as SQL literals, in placeholder order.
    pub params: Vec<String>,
    /// Dialect of the session that ran the statement.
    pub dialect: Dialect,
}

impl StatementSnapshot {
    /// A snapshot of a statement without parameters.
    pub fn new(kind: QueryKind, sql: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            kind,
            sql: sql.into(),
            params: Vec::new(),
            dialect,
        }
    }

    /// Snapshot a statement and render its parameters.
    pub fn capture(
        kind: QueryKind,
        sql: &str,
        params: &[&dyn SqlParam],
        dialect: Dialect,
    ) -> Self {
        Self {
            kind,
            sql: sql.to_string(),
            params: render_params(params, dialect),
            dialect,
        }
    }

    /// The statement with every parameter inlined, ready to be explained.
    pub fn explained_sql(&self) -> String {
        interpolate(&self.sql, &self.params, self.dialect)
    }
}

/// Runs explain statements as plain text on a session.
#[async_trait::async_trait]
pub trait ExplainExecutor: Send + Sync {
    /// Execute `sql` and return one text value per result row.
    ///
    /// The outer error means the statement failed. An inner error marks a single
    /// row that could not be decoded.
    async fn explain(&self, sql: &str) -> ScanResult<Vec<ScanResult<String>>>;
}

/// What a [`StatementHook`] receives after a watched statement ran.
#[derive(Clone)]
pub struct StatementEvent {
    statement: StatementSnapshot,
    session: Weak<dyn ExplainExecutor>,
}

impl StatementEvent {
    pub fn new(statement: StatementSnapshot, session: Weak<dyn ExplainExecutor>) -> Self {
        Self { statement, session }
    }

    /// The statement that triggered the event.
    pub fn statement(&self) -> &StatementSnapshot {
        &self.statement
    }

    /// The session the statement ran on.
    ///
    /// The event only holds a weak handle, so this fails once the session is gone.
    pub fn executor(&self) -> ScanResult<Arc<dyn ExplainExecutor>> {
        self.session
            .upgrade()
            .ok_or_else(|| ScanError::ConnectionAccess("the session has been closed".to_string()))
    }
}

impl std::fmt::Debug for StatementEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementEvent")
            .field("statement", &self.statement)
            .field("session_alive", &(self.session.strong_count() > 0))
            .finish()
    }
}

/// A callback run after a statement of a subscribed kind completed.
#[async_trait::async_trait]
pub trait StatementHook: Send + Sync {
    async fn on_statement(&self, event: StatementEvent);
}

/// One hook to attach under a key for a kind.
#[derive(Clone)]
pub struct Subscription {
    pub kind: QueryKind,
    pub key: String,
    pub hook: Arc<dyn StatementHook>,
}

impl Subscription {
    pub fn new(kind: QueryKind, key: impl Into<String>, hook: Arc<dyn StatementHook>) -> Self {
        Self {
            kind,
            key: key.into(),
            hook,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .finish()
    }
}

/// A session that fires lifecycle events for the statements it runs.
///
/// Implement this to plug scan alerts into a query layer other than
/// [`ObservedClient`](crate::ObservedClient).
pub trait LifecycleSource {
    /// The dialect of the underlying database.
    fn dialect(&self) -> Dialect;

    /// Attach `hook` to `kind` under `key`.
    ///
    /// Fails with [`ScanError::Registration`] if `key` is already taken for `kind`.
    fn subscribe(&self, kind: QueryKind, key: &str, hook: Arc<dyn StatementHook>)
    -> ScanResult<()>;

    /// Attach several hooks.
    ///
    /// The default implementation subscribes one by one and stops at the first
    /// error; sources that can validate the whole batch first should override it.
    fn subscribe_all(&self, subscriptions: Vec<Subscription>) -> ScanResult<()> {
        for sub in subscriptions {
            self.subscribe(sub.kind, &sub.key, sub.hook)?;
        }
        Ok(())
    }
}
