//! Small SQL text helpers: statement kind detection and truncation for logs.

use crate::options::QueryKind;

/// Skip whitespace and SQL comments (`--` and `/* */`).
fn skip_trivia(sql: &str) -> &str {
    let mut s = sql;
    loop {
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix("--") {
            match rest.find('\n') {
                Some(pos) => s = &rest[pos + 1..],
                None => return "",
            }
        } else if let Some(rest) = s.strip_prefix("/*") {
            match rest.find("*/") {
                Some(pos) => s = &rest[pos + 2..],
                None => return "",
            }
        } else {
            return s;
        }
    }
}

/// Strip leading whitespace, SQL comments, and parentheses from a SQL string to
/// find the first meaningful keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = skip_trivia(sql);
    while let Some(rest) = s.strip_prefix('(') {
        s = skip_trivia(rest);
    }
    s
}

/// Case-insensitive keyword match that does not accept a longer identifier
/// (`SELECTED` is not `SELECT`).
pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(keyword) => !s[keyword.len()..]
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_'),
        _ => false,
    }
}

/// Classify a statement run through the structured query path.
///
/// Statements that are not plain DML (DDL, `SET`, `EXPLAIN`, ...) are treated as raw SQL.
pub(crate) fn detect_kind(sql: &str) -> QueryKind {
    let trimmed = strip_sql_prefix(sql);
    if starts_with_keyword(trimmed, "SELECT") {
        QueryKind::Select
    } else if starts_with_keyword(trimmed, "INSERT") {
        QueryKind::Create
    } else if starts_with_keyword(trimmed, "UPDATE") {
        QueryKind::Update
    } else if starts_with_keyword(trimmed, "DELETE") {
        QueryKind::Delete
    } else if starts_with_keyword(trimmed, "WITH") {
        detect_cte_dml(trimmed)
    } else {
        QueryKind::Raw
    }
}

/// Classify a `WITH` statement by the statement that follows its CTE list.
///
/// Walks `WITH [RECURSIVE] name [(cols)] AS [NOT] [MATERIALIZED] (...) [, ...]`.
/// Anything that does not parse that way counts as a query.
fn detect_cte_dml(sql: &str) -> QueryKind {
    cte_body(sql)
        .and_then(|body| {
            let body = strip_sql_prefix(body);
            if starts_with_keyword(body, "INSERT") {
                Some(QueryKind::Create)
            } else if starts_with_keyword(body, "UPDATE") {
                Some(QueryKind::Update)
            } else if starts_with_keyword(body, "DELETE") {
                Some(QueryKind::Delete)
            } else {
                None
            }
        })
        .unwrap_or(QueryKind::Select)
}

/// The text after the CTE list of a `WITH` statement.
fn cte_body(sql: &str) -> Option<&str> {
    let mut s = skip_trivia(after_keyword(sql, "WITH")?);
    if let Some(rest) = after_keyword(s, "RECURSIVE") {
        s = skip_trivia(rest);
    }

    loop {
        s = skip_trivia(skip_identifier(s)?);
        if s.starts_with('(') {
            s = skip_trivia(skip_parens(s)?);
        }
        s = skip_trivia(after_keyword(s, "AS")?);
        if let Some(rest) = after_keyword(s, "NOT") {
            s = skip_trivia(rest);
        }
        if let Some(rest) = after_keyword(s, "MATERIALIZED") {
            s = skip_trivia(rest);
        }
        if !s.starts_with('(') {
            return None;
        }
        s = skip_trivia(skip_parens(s)?);
        match s.strip_prefix(',') {
            Some(rest) => s = skip_trivia(rest),
            None => return Some(s),
        }
    }
}

fn after_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    starts_with_keyword(s, keyword).then(|| &s[keyword.len()..])
}

/// Skip a bare or double-quoted identifier.
fn skip_identifier(s: &str) -> Option<&str> {
    if let Some(rest) = s.strip_prefix('"') {
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 2;
                    continue;
                }
                return Some(&rest[i + 1..]);
            }
            i += 1;
        }
        return None;
    }
    let end = s
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80))
        .unwrap_or(s.len());
    (end > 0).then(|| &s[end..])
}

/// Skip a balanced parenthesized group starting at `s`, ignoring parentheses
/// inside string literals and quoted identifiers.
fn skip_parens(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[i + 1..]);
                }
            }
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_structured_kinds() {
        assert_eq!(detect_kind("SELECT * FROM fruits"), QueryKind::Select);
        assert_eq!(detect_kind("  select * FROM fruits"), QueryKind::Select);
        assert_eq!(detect_kind("(SELECT 1) UNION (SELECT 2)"), QueryKind::Select);
        assert_eq!(detect_kind("-- note\nSELECT 1"), QueryKind::Select);
        assert_eq!(detect_kind("/* tag */ DELETE FROM fruits WHERE id = 1"), QueryKind::Delete);
        assert_eq!(detect_kind("INSERT INTO fruits (name) VALUES ($1)"), QueryKind::Create);
        assert_eq!(detect_kind("UPDATE fruits SET name = $1"), QueryKind::Update);
    }

    #[test]
    fn non_dml_is_raw() {
        assert_eq!(detect_kind("CREATE TABLE fruits (id INT)"), QueryKind::Raw);
        assert_eq!(detect_kind("SET enable_seqscan = off"), QueryKind::Raw);
        assert_eq!(detect_kind("SELECTED"), QueryKind::Raw);
        assert_eq!(detect_kind(""), QueryKind::Raw);
    }

    #[test]
    fn detects_cte_dml() {
        assert_eq!(
            detect_kind("WITH cte AS (SELECT 1) SELECT * FROM cte"),
            QueryKind::Select
        );
        assert_eq!(
            detect_kind("WITH old AS (SELECT id FROM fruits WHERE name = 'a)') DELETE FROM fruits USING old"),
            QueryKind::Delete
        );
        assert_eq!(
            detect_kind("WITH a AS (SELECT 1), b AS (SELECT 2) UPDATE fruits SET name = 'x'"),
            QueryKind::Update
        );
        assert_eq!(
            detect_kind("WITH src AS (SELECT 1) INSERT INTO fruits (name) VALUES ('kiwi')"),
            QueryKind::Create
        );
        assert_eq!(
            detect_kind(
                "WITH ids AS (SELECT id FROM fruits) UPDATE fruits SET name = (SELECT 'x') WHERE id IN (SELECT id FROM ids)"
            ),
            QueryKind::Update
        );
        assert_eq!(
            detect_kind(
                "WITH RECURSIVE t(n) AS NOT MATERIALIZED (VALUES (1) UNION ALL SELECT n + 1 FROM t) SELECT count(*) FROM t"
            ),
            QueryKind::Select
        );
        assert_eq!(
            detect_kind(
                "WITH \"Old Rows\" AS MATERIALIZED (SELECT 1), /* c */ b AS (SELECT ')') DELETE FROM fruits"
            ),
            QueryKind::Delete
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_sql_bytes("SELECT 1", 100), "SELECT 1");
        assert_eq!(truncate_sql_bytes("SELECT * FROM users", 10), "SELECT * F");
        assert_eq!(truncate_sql_bytes("éé", 3), "é");
    }
}
