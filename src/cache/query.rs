//! Validation for ad-hoc cache queries.
//!
//! Queries are a debugging aid, so only a single read-only statement is let
//! through. This module checks the leading keyword against an allow-list
//! before the database is touched. The store then lets SQLite split the text
//! into statements: exactly one must be present and it must report itself as
//! read-only.

use crate::error::DocsError;

/// Statement keywords accepted by [`validate_read_only`]
pub const READ_ONLY_KEYWORDS: &[&str] = &["SELECT", "WITH", "EXPLAIN"];

/// Check the leading keyword of `sql` and return the statement text with
/// leading comments and surrounding whitespace removed.
pub fn validate_read_only(sql: &str) -> Result<&str, DocsError> {
    let body = skip_trivia(sql);
    if body.is_empty() {
        return Err(DocsError::cache_validation("Query is empty"));
    }

    let keyword: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if !READ_ONLY_KEYWORDS.contains(&keyword.as_str()) {
        return Err(DocsError::cache_validation(format!(
            "Only read-only statements are allowed ({}), got '{}'",
            READ_ONLY_KEYWORDS.join(", "),
            if keyword.is_empty() { body.chars().take(16).collect() } else { keyword },
        )));
    }

    Ok(body.trim_end())
}

/// Skip leading whitespace and SQL comments
fn skip_trivia(mut sql: &str) -> &str {
    loop {
        let trimmed = sql.trim_start();
        if let Some(rest) = trimmed.strip_prefix("--") {
            sql = rest.find('\n').map_or("", |i| &rest[i + 1..]);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            sql = rest.find("*/").map_or("", |i| &rest[i + 2..]);
        } else {
            return trimmed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(sql: &str) -> bool {
        matches!(
            validate_read_only(sql),
            Err(DocsError::CacheValidation { .. })
        )
    }

    #[test]
    fn test_accepts_read_only_statements() {
        assert_eq!(
            validate_read_only("SELECT * FROM cache_entries").unwrap(),
            "SELECT * FROM cache_entries"
        );
        assert_eq!(
            validate_read_only("  select key from cache_entries;  ").unwrap(),
            "select key from cache_entries;"
        );
        assert!(validate_read_only("WITH t AS (SELECT 1) SELECT * FROM t").is_ok());
        assert!(validate_read_only("EXPLAIN QUERY PLAN SELECT * FROM cache_entries").is_ok());
        assert_eq!(
            validate_read_only("-- comment\n/* block */ SELECT 1").unwrap(),
            "SELECT 1"
        );
    }

    #[test]
    fn test_rejects_writes() {
        assert!(rejected("DELETE FROM cache_entries"));
        assert!(rejected("drop table cache_entries"));
        assert!(rejected("INSERT INTO cache_entries VALUES (1)"));
        assert!(rejected("UPDATE cache_entries SET ttl = 0"));
        assert!(rejected("PRAGMA writable_schema = 1"));
        assert!(rejected("ATTACH DATABASE 'x.db' AS x"));
        assert!(rejected("-- SELECT\nDELETE FROM cache_entries"));
    }

    #[test]
    fn test_rejects_empty() {
        assert!(rejected(""));
        assert!(rejected("   "));
        assert!(rejected("-- only a comment"));
        assert!(rejected(";"));
    }
}
