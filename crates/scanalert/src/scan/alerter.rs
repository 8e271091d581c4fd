use super::action::ScanAction;
use crate::dialect::DialectTable;
use crate::error::{ScanError, ScanResult};
use crate::hook::{LifecycleSource, StatementEvent, StatementHook, StatementSnapshot, Subscription};
use crate::options::AlertOptions;
use std::sync::Arc;

/// Result of one scan.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The plan shows no sequential scan.
    Clean,
    /// The plan contains the dialect's scan marker. The action has been called.
    Detected {
        /// Plan rows joined with `\n`.
        plan: String,
    },
    /// The plan could not be obtained. The error went to the error sink.
    Inconclusive(ScanError),
}

impl ScanOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected { .. })
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Inconclusive(_))
    }
}

/// Explains watched statements and reports the ones that scan a whole table.
pub struct ScanAlerter {
    options: AlertOptions,
    action: Arc<dyn ScanAction>,
    dialects: DialectTable,
}

impl ScanAlerter {
    /// Create an alerter with the built-in dialect table.
    pub fn new<A: ScanAction + 'static>(options: AlertOptions, action: A) -> Self {
        Self::from_arc(options, Arc::new(action))
    }

    /// Create an alerter from a shared action.
    pub fn from_arc(options: AlertOptions, action: Arc<dyn ScanAction>) -> Self {
        Self {
            options,
            action,
            dialects: DialectTable::builtin(),
        }
    }

    /// Replace the dialect table.
    pub fn with_dialects(mut self, dialects: DialectTable) -> Self {
        self.dialects = dialects;
        self
    }

    pub fn options(&self) -> &AlertOptions {
        &self.options
    }

    pub fn dialects(&self) -> &DialectTable {
        &self.dialects
    }

    /// Subscribe this alerter to every watched kind of `source`.
    ///
    /// Each kind is registered under `{name}_{kind}`. Watching no kind is not an error.
    pub fn register<S: LifecycleSource + ?Sized>(self, source: &S) -> ScanResult<()> {
        Arc::new(self).register_arc(source)
    }

    /// Like [`ScanAlerter::register`], for an alerter that is already shared.
    pub fn register_arc<S: LifecycleSource + ?Sized>(self: Arc<Self>, source: &S) -> ScanResult<()> {
        if self.options.name.is_empty() {
            return Err(ScanError::registration("", "alert name must not be empty"));
        }

        let dialect = source.dialect();
        if !self.dialects.supports(dialect) {
            tracing::warn!(
                target: "scanalert",
                alert = %self.options.name,
                %dialect,
                "no explain support for this dialect; statements will not be checked"
            );
        }

        let hook: Arc<dyn StatementHook> = Arc::new(ScanHook(self.clone()));
        let subscriptions: Vec<Subscription> = self
            .options
            .query_kinds
            .iter()
            .map(|kind| Subscription::new(*kind, self.options.hook_key(*kind), hook.clone()))
            .collect();
        if subscriptions.is_empty() {
            return Ok(());
        }

        source.subscribe_all(subscriptions)?;
        tracing::debug!(
            target: "scanalert",
            alert = %self.options.name,
            kinds = ?self.options.query_kinds,
            async_scan = self.options.async_scan,
            "scan alert registered"
        );
        Ok(())
    }

    /// Explain the event's statement and check the plan for a sequential scan.
    ///
    /// Calls the action on detection. Failures are reported to the error sink and
    /// returned as [`ScanOutcome::Inconclusive`]; they never panic or propagate.
    pub async fn scan(&self, event: &StatementEvent) -> ScanOutcome {
        let statement = event.statement();

        let Some(entry) = self.dialects.get(statement.dialect) else {
            return self.inconclusive(
                statement,
                ScanError::UnsupportedDialect(statement.dialect.to_string()),
            );
        };

        let executor = match event.executor() {
            Ok(executor) => executor,
            Err(err) => return self.inconclusive(statement, err),
        };

        let explain_sql = entry.explain_sql(&statement.explained_sql());
        tracing::debug!(
            target: "scanalert",
            alert = %self.options.name,
            kind = %statement.kind,
            dialect = %statement.dialect,
            sql = %explain_sql,
            "explaining statement"
        );

        let rows = match executor.explain(&explain_sql).await {
            Ok(rows) => rows,
            Err(err) => return self.inconclusive(statement, err),
        };

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Ok(line) => lines.push(line),
                Err(err) => self.options.report(&err.to_string()),
            }
        }
        let plan = lines.join("\n");

        if entry.is_scan(&plan) {
            self.action.on_scan(&statement.sql, &plan);
            ScanOutcome::Detected { plan }
        } else {
            ScanOutcome::Clean
        }
    }

    fn inconclusive(&self, statement: &StatementSnapshot, err: ScanError) -> ScanOutcome {
        tracing::debug!(
            target: "scanalert",
            alert = %self.options.name,
            kind = %statement.kind,
            error = %err,
            "scan inconclusive"
        );
        self.options.report(&err.to_string());
        ScanOutcome::Inconclusive(err)
    }
}

impl std::fmt::Debug for ScanAlerter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanAlerter")
            .field("options", &self.options)
            .field("dialects", &self.dialects)
            .finish_non_exhaustive()
    }
}

/// The hook registered on the source; detaches the scan in async mode.
struct ScanHook(Arc<ScanAlerter>);

#[async_trait::async_trait]
impl StatementHook for ScanHook {
    async fn on_statement(&self, event: StatementEvent) {
        if self.0.options.async_scan {
            let alerter = self.0.clone();
            tokio::spawn(async move {
                alerter.scan(&event).await;
            });
        } else {
            self.0.scan(&event).await;
        }
    }
}

/// Register a scan alert on `source` that calls `action` for every sequential scan.
///
/// # Example
///
/// ```ignore
/// use scanalert::{AlertOptions, ObservedClient, register_scan_alert};
///
/// let client = ObservedClient::new(pg_client);
/// register_scan_alert(&client, AlertOptions::default(), |sql: &str, plan: &str| {
///     eprintln!("missing index for {sql}:\n{plan}");
/// })?;
/// ```
pub fn register_scan_alert<S, A>(source: &S, options: AlertOptions, action: A) -> ScanResult<()>
where
    S: LifecycleSource + ?Sized,
    A: ScanAction + 'static,
{
    ScanAlerter::new(options, action).register(source)
}
