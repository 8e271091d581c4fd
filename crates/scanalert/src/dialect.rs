//! Per-dialect explain syntax and sequential-scan markers.

use std::collections::BTreeMap;
use std::fmt;

/// The database engine a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    /// PostgreSQL
    Postgres,
    /// MySQL
    Mysql,
    /// Anything else. Never resolves to a [`DialectEntry`].
    Unknown,
}

impl Dialect {
    /// Parse a dialect from a driver/ORM name. Unrecognized names map to [`Dialect::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Dialect::Postgres,
            "mysql" => Dialect::Mysql,
            _ => Dialect::Unknown,
        }
    }

    /// The canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
            Dialect::Unknown => "unknown",
        }
    }

    /// How bound parameters are written in this dialect's SQL text.
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match self {
            Dialect::Mysql => PlaceholderStyle::Question,
            Dialect::Postgres | Dialect::Unknown => PlaceholderStyle::Dollar,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placeholder syntax for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...` (PostgreSQL)
    Dollar,
    /// `?` in positional order (MySQL)
    Question,
}

/// What to prepend to a statement to get its plan, and what to look for in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectEntry {
    /// Text prepended to the statement, including the trailing space.
    pub explain_prefix: String,
    /// Case-sensitive substring that marks a full table scan in the plan output.
    pub scan_marker: String,
}

impl DialectEntry {
    pub fn new(explain_prefix: impl Into<String>, scan_marker: impl Into<String>) -> Self {
        Self {
            explain_prefix: explain_prefix.into(),
            scan_marker: scan_marker.into(),
        }
    }

    /// Build the explain statement for an already interpolated query.
    pub fn explain_sql(&self, sql: &str) -> String {
        format!("{}{}", self.explain_prefix, sql)
    }

    /// Whether the plan text reports a full table scan.
    pub fn is_scan(&self, plan: &str) -> bool {
        !self.scan_marker.is_empty() && plan.contains(self.scan_marker.as_str())
    }
}

/// Immutable lookup table from [`Dialect`] to its [`DialectEntry`].
///
/// Handed to a [`ScanAlerter`](crate::ScanAlerter) at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectTable {
    entries: BTreeMap<Dialect, DialectEntry>,
}

impl DialectTable {
    /// The built-in PostgreSQL and MySQL entries.
    pub fn builtin() -> Self {
        Self::empty()
            .with_entry(Dialect::Postgres, "EXPLAIN ", "Seq Scan")
            .with_entry(Dialect::Mysql, "EXPLAIN format=tree ", "Table scan")
    }

    /// A table without any entries (every lookup fails).
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace the entry for `dialect`.
    ///
    /// Entries for [`Dialect::Unknown`] are ignored.
    pub fn with_entry(
        mut self,
        dialect: Dialect,
        explain_prefix: impl Into<String>,
        scan_marker: impl Into<String>,
    ) -> Self {
        if dialect != Dialect::Unknown {
            self.entries
                .insert(dialect, DialectEntry::new(explain_prefix, scan_marker));
        }
        self
    }

    /// Look up a dialect. An entry with an empty scan marker counts as missing,
    /// since it would match every plan.
    pub fn get(&self, dialect: Dialect) -> Option<&DialectEntry> {
        self.entries
            .get(&dialect)
            .filter(|entry| !entry.scan_marker.is_empty())
    }

    /// Whether `dialect` can be checked with this table.
    pub fn supports(&self, dialect: Dialect) -> bool {
        self.get(dialect).is_some()
    }
}

impl Default for DialectTable {
    fn default() -> Self {
        Self::builtin()
    }
}
