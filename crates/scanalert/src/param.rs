//! Bound parameters that can be both executed and rendered back into SQL text.
//!
//! The explain query is issued as plain text, so every parameter of the original
//! statement has to be inlined as a literal first. [`SqlParam`] carries both views
//! of a value: the `ToSql` one used for the real execution and the literal used
//! for the explain form.

use crate::dialect::{Dialect, PlaceholderStyle};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt::Write;
use tokio_postgres::types::ToSql;

/// A query parameter that can be executed and rendered as a SQL literal.
pub trait SqlParam: Sync {
    /// The value as a `tokio-postgres` parameter.
    fn as_to_sql(&self) -> &(dyn ToSql + Sync);

    /// Append the value as a SQL literal for `dialect`.
    fn write_literal(&self, dialect: Dialect, out: &mut String);

    /// The value as a SQL literal for `dialect`.
    fn to_literal(&self, dialect: Dialect) -> String {
        let mut out = String::new();
        self.write_literal(dialect, &mut out);
        out
    }
}

/// Append `value` as a single-quoted string literal.
///
/// MySQL treats backslashes as escapes inside strings; PostgreSQL (with
/// `standard_conforming_strings`) does not.
pub fn write_quoted(value: &str, dialect: Dialect, out: &mut String) {
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' if dialect == Dialect::Mysql => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
}

macro_rules! impl_display_param {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SqlParam for $ty {
                fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
                    self
                }

                fn write_literal(&self, _dialect: Dialect, out: &mut String) {
                    let _ = write!(out, "{self}");
                }
            }
        )*
    };
}

impl_display_param!(i8, i16, i32, i64);

macro_rules! impl_float_param {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SqlParam for $ty {
                fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
                    self
                }

                fn write_literal(&self, dialect: Dialect, out: &mut String) {
                    if self.is_nan() {
                        write_quoted("NaN", dialect, out);
                    } else if self.is_infinite() {
                        let text = if self.is_sign_positive() { "Infinity" } else { "-Infinity" };
                        write_quoted(text, dialect, out);
                    } else {
                        let _ = write!(out, "{self}");
                    }
                }
            }
        )*
    };
}

impl_float_param!(f32, f64);

impl SqlParam for bool {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, _dialect: Dialect, out: &mut String) {
        out.push_str(if *self { "TRUE" } else { "FALSE" });
    }
}

impl SqlParam for String {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        write_quoted(self, dialect, out);
    }
}

impl SqlParam for &str {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        write_quoted(self, dialect, out);
    }
}

impl SqlParam for Vec<u8> {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        match dialect {
            Dialect::Mysql => out.push_str("X'"),
            Dialect::Postgres | Dialect::Unknown => out.push_str("'\\x"),
        }
        for byte in self {
            let _ = write!(out, "{byte:02x}");
        }
        out.push('\'');
    }
}

impl SqlParam for uuid::Uuid {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        write_quoted(&self.hyphenated().to_string(), dialect, out);
    }
}

impl SqlParam for serde_json::Value {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        write_quoted(&self.to_string(), dialect, out);
    }
}

impl SqlParam for NaiveDate {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        write_quoted(&self.format("%Y-%m-%d").to_string(), dialect, out);
    }
}

impl SqlParam for NaiveTime {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        write_quoted(&self.format("%H:%M:%S%.f").to_string(), dialect, out);
    }
}

impl SqlParam for NaiveDateTime {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        write_quoted(&self.format("%Y-%m-%d %H:%M:%S%.f").to_string(), dialect, out);
    }
}

impl SqlParam for DateTime<Utc> {
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        let text = match dialect {
            // MySQL rejects offsets in DATETIME literals.
            Dialect::Mysql => self.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Dialect::Postgres | Dialect::Unknown => self.to_rfc3339(),
        };
        write_quoted(&text, dialect, out);
    }
}

impl<T> SqlParam for Option<T>
where
    T: SqlParam + ToSql + Sync,
{
    fn as_to_sql(&self) -> &(dyn ToSql + Sync) {
        self
    }

    fn write_literal(&self, dialect: Dialect, out: &mut String) {
        match self {
            Some(value) => value.write_literal(dialect, out),
            None => out.push_str("NULL"),
        }
    }
}

/// Render every parameter as a literal, in order.
pub fn render_params(params: &[&dyn SqlParam], dialect: Dialect) -> Vec<String> {
    params.iter().map(|p| p.to_literal(dialect)).collect()
}

/// Borrow every parameter as a `tokio-postgres` parameter, in order.
pub fn as_to_sql_refs<'a>(params: &[&'a dyn SqlParam]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_to_sql()).collect()
}

/// Substitute rendered literals for the placeholders in `sql`.
///
/// Placeholders are `$N` (1-based) for PostgreSQL and `?` (positional) for MySQL.
/// Placeholders inside string literals, quoted identifiers, dollar-quoted bodies,
/// and comments are left alone, as are placeholders without a matching literal.
pub fn interpolate(sql: &str, literals: &[String], dialect: Dialect) -> String {
    let style = dialect.placeholder_style();
    let is_mysql = dialect == Dialect::Mysql;
    let bytes = sql.as_bytes();
    let extra: usize = literals.iter().map(String::len).sum();
    let mut out = String::with_capacity(sql.len() + extra);

    let mut copied = 0;
    let mut positional = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let backslash_escapes = is_mysql || opens_escape_string(bytes, i);
                i = skip_quoted(bytes, i, b'\'', backslash_escapes);
            }
            b'"' => i = skip_quoted(bytes, i, b'"', false),
            b'`' if is_mysql => i = skip_quoted(bytes, i, b'`', false),
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_line_comment(bytes, i),
            b'#' if is_mysql => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'$' if style == PlaceholderStyle::Dollar => {
                if i > 0 && is_ident_byte(bytes[i - 1]) {
                    i += 1;
                    continue;
                }
                let digits_end = scan_digits(bytes, i + 1);
                if digits_end > i + 1 {
                    let literal = sql[i + 1..digits_end]
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|idx| literals.get(idx));
                    if let Some(literal) = literal {
                        out.push_str(&sql[copied..i]);
                        out.push_str(literal);
                        copied = digits_end;
                    }
                    i = digits_end;
                } else {
                    i = skip_dollar_quoted(sql, i).unwrap_or(i + 1);
                }
            }
            b'?' if style == PlaceholderStyle::Question => {
                if let Some(literal) = literals.get(positional) {
                    out.push_str(&sql[copied..i]);
                    out.push_str(literal);
                    copied = i + 1;
                }
                positional += 1;
                i += 1;
            }
            _ => i += 1,
        }
    }

    out.push_str(&sql[copied..]);
    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// PostgreSQL `E'...'` strings honor backslash escapes.
fn opens_escape_string(bytes: &[u8], quote: usize) -> bool {
    quote > 0
        && matches!(bytes[quote - 1], b'E' | b'e')
        && (quote < 2 || !is_ident_byte(bytes[quote - 2]))
}

fn scan_digits(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    i
}

/// Returns the index just past the closing quote (or the end of input).
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    match bytes[start..].iter().position(|&b| b == b'\n') {
        Some(pos) => start + pos + 1,
        None => bytes.len(),
    }
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Skip a `$tag$ ... $tag$` body starting at `start`. `None` if `start` does not
/// open a dollar quote.
fn skip_dollar_quoted(sql: &str, start: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() && is_ident_byte(bytes[i]) {
        i += 1;
    }
    if bytes.get(i) != Some(&b'$') {
        return None;
    }
    let tag = &sql[start..=i];
    let body_start = i + 1;
    Some(match sql[body_start..].find(tag) {
        Some(pos) => body_start + pos + tag.len(),
        None => bytes.len(),
    })
}
