use super::registry::HookRegistry;
use super::types::{
    ExplainExecutor, LifecycleSource, StatementEvent, StatementHook, StatementSnapshot,
    Subscription,
};
use crate::client::GenericClient;
use crate::dialect::Dialect;
use crate::error::{OrmResult, ScanResult};
use crate::options::QueryKind;
use crate::param::{SqlParam, as_to_sql_refs};
use crate::sql::detect_kind;
use std::sync::{Arc, Weak};
use tokio_postgres::Row;

/// A database client that fires lifecycle events for every statement it runs.
///
/// Two paths are offered, mirroring how ORMs separate their query API from raw SQL:
/// - `query` / `query_one` / `query_opt` / `execute` detect the kind from the
///   leading keyword (SELECT, INSERT, UPDATE, DELETE; anything else is raw);
/// - `raw` / `exec` always fire [`QueryKind::Raw`].
///
/// Hooks run after the statement succeeded and before the call returns.
pub struct ObservedClient<C> {
    client: Arc<C>,
    hooks: HookRegistry,
    dialect: Dialect,
}

impl<C> ObservedClient<C>
where
    C: GenericClient + ExplainExecutor + 'static,
{
    /// Wrap a PostgreSQL client.
    pub fn new(client: C) -> Self {
        Self::from_arc(Arc::new(client))
    }

    /// Wrap a shared client.
    ///
    /// Detached scans only hold a weak handle, so keeping another `Arc` alive
    /// lets them finish after this wrapper is dropped.
    pub fn from_arc(client: Arc<C>) -> Self {
        Self {
            client,
            hooks: HookRegistry::new(),
            dialect: Dialect::Postgres,
        }
    }

    /// Override the reported dialect (for wire-compatible servers).
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Get a reference to the inner client.
    pub fn inner(&self) -> &C {
        &self.client
    }

    /// Get the shared inner client.
    pub fn inner_arc(&self) -> Arc<C> {
        self.client.clone()
    }

    /// The session's hook table.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Execute a query and return all rows.
    pub async fn query(&self, sql: &str, params: &[&dyn SqlParam]) -> OrmResult<Vec<Row>> {
        self.query_inner(detect_kind(sql), sql, params).await
    }

    /// Execute a query and return the first row.
    pub async fn query_one(&self, sql: &str, params: &[&dyn SqlParam]) -> OrmResult<Row> {
        let snapshot = self.snapshot(detect_kind(sql), sql, params);
        let row = self.client.query_one(sql, &as_to_sql_refs(params)).await?;
        self.fire(snapshot).await;
        Ok(row)
    }

    /// Execute a query and return the first row, if any.
    pub async fn query_opt(&self, sql: &str, params: &[&dyn SqlParam]) -> OrmResult<Option<Row>> {
        let snapshot = self.snapshot(detect_kind(sql), sql, params);
        let row = self.client.query_opt(sql, &as_to_sql_refs(params)).await?;
        self.fire(snapshot).await;
        Ok(row)
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[&dyn SqlParam]) -> OrmResult<u64> {
        self.execute_inner(detect_kind(sql), sql, params).await
    }

    /// Run raw SQL and return all rows. Fires [`QueryKind::Raw`].
    pub async fn raw(&self, sql: &str, params: &[&dyn SqlParam]) -> OrmResult<Vec<Row>> {
        self.query_inner(QueryKind::Raw, sql, params).await
    }

    /// Run raw SQL and return the number of affected rows. Fires [`QueryKind::Raw`].
    pub async fn exec(&self, sql: &str, params: &[&dyn SqlParam]) -> OrmResult<u64> {
        self.execute_inner(QueryKind::Raw, sql, params).await
    }

    async fn query_inner(
        &self,
        kind: QueryKind,
        sql: &str,
        params: &[&dyn SqlParam],
    ) -> OrmResult<Vec<Row>> {
        let snapshot = self.snapshot(kind, sql, params);
        let rows = self.client.query(sql, &as_to_sql_refs(params)).await?;
        self.fire(snapshot).await;
        Ok(rows)
    }

    async fn execute_inner(
        &self,
        kind: QueryKind,
        sql: &str,
        params: &[&dyn SqlParam],
    ) -> OrmResult<u64> {
        let snapshot = self.snapshot(kind, sql, params);
        let affected = self.client.execute(sql, &as_to_sql_refs(params)).await?;
        self.fire(snapshot).await;
        Ok(affected)
    }

    /// Snapshot the statement if anything watches its kind.
    fn snapshot(
        &self,
        kind: QueryKind,
        sql: &str,
        params: &[&dyn SqlParam],
    ) -> Option<StatementSnapshot> {
        self.hooks
            .is_watched(kind)
            .then(|| StatementSnapshot::capture(kind, sql, params, self.dialect))
    }

    async fn fire(&self, snapshot: Option<StatementSnapshot>) {
        let Some(snapshot) = snapshot else {
            return;
        };
        let session: Weak<dyn ExplainExecutor> = Arc::<C>::downgrade(&self.client);
        self.hooks
            .dispatch(StatementEvent::new(snapshot, session))
            .await;
    }
}

impl<C> LifecycleSource for ObservedClient<C>
where
    C: GenericClient + ExplainExecutor + 'static,
{
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn subscribe(
        &self,
        kind: QueryKind,
        key: &str,
        hook: Arc<dyn StatementHook>,
    ) -> ScanResult<()> {
        self.hooks.register(kind, key, hook)
    }

    fn subscribe_all(&self, subscriptions: Vec<Subscription>) -> ScanResult<()> {
        self.hooks.register_all(subscriptions)
    }
}

impl<C> std::fmt::Debug for ObservedClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedClient")
            .field("dialect", &self.dialect)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
