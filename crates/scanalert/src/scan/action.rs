use crate::sql::truncate_sql_bytes;
use tracing::Level;

/// What to do when a statement caused a sequential scan.
///
/// Implemented for every `Fn(&str, &str) + Send + Sync` closure, called with the
/// original SQL and the full plan text.
pub trait ScanAction: Send + Sync {
    fn on_scan(&self, source_sql: &str, plan: &str);
}

impl<F> ScanAction for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn on_scan(&self, source_sql: &str, plan: &str) {
        self(source_sql, plan)
    }
}

/// A `tracing`-based action that logs every detected scan.
///
/// Events go to target `scanalert` with the SQL and plan as fields.
#[derive(Debug, Clone)]
pub struct TracingAlert {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingAlert {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            max_sql_length: Some(200),
        }
    }
}

impl TracingAlert {
    /// Create a new action with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl ScanAction for TracingAlert {
    fn on_scan(&self, source_sql: &str, plan: &str) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(source_sql);
        emit_at_level!(
            self.level,
            target: "scanalert",
            sql = %sql,
            plan = %plan,
            "query executed a sequential scan"
        );
    }
}
