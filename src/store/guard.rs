//! Read-only statement validator for the free-text query box.

use thiserror::Error;

/// Leading keywords accepted when queries are restricted to reads.
const READ_ONLY_VERBS: [&str; 4] = ["SELECT", "WITH", "VALUES", "EXPLAIN"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryRejection {
    #[error("Query is empty")]
    Empty,
    #[error("Only read-only statements are allowed (got {0})")]
    NotReadOnly(String),
    #[error("You can only execute one statement at a time")]
    MultipleStatements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPolicy {
    #[default]
    ReadOnly,
    Unrestricted,
}

impl QueryPolicy {
    pub fn from_read_only_flag(read_only: bool) -> Self {
        if read_only {
            QueryPolicy::ReadOnly
        } else {
            QueryPolicy::Unrestricted
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryGuard {
    pub policy: QueryPolicy,
}

impl QueryGuard {
    pub fn new(policy: QueryPolicy) -> Self {
        Self { policy }
    }

    /// Check the statement's leading verb. SQLite's own read-only verdict is
    /// checked separately once the statement is prepared.
    pub fn check(&self, sql: &str) -> Result<(), QueryRejection> {
        let body = strip_leading_comments(sql);
        if body.is_empty() {
            return Err(QueryRejection::Empty);
        }
        if has_trailing_statement(body) {
            return Err(QueryRejection::MultipleStatements);
        }
        if self.policy == QueryPolicy::Unrestricted {
            return Ok(());
        }

        let verb: String = body
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();
        if READ_ONLY_VERBS.contains(&verb.as_str()) {
            Ok(())
        } else {
            Err(QueryRejection::NotReadOnly(if verb.is_empty() {
                body.chars().take(16).collect()
            } else {
                verb
            }))
        }
    }

    pub fn requires_read_only(&self) -> bool {
        self.policy == QueryPolicy::ReadOnly
    }
}

/// Skip whitespace, `-- line` and `/* block */` comments at the start.
fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(pos) => after[pos + 1..].trim_start(),
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(pos) => after[pos + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest.trim_end_matches(|c: char| c.is_whitespace() || c == ';');
        }
    }
}

/// True when a `;` outside quotes and comments is followed by more SQL.
fn has_trailing_statement(sql: &str) -> bool {
    let mut chars = sql.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                // Doubled quotes inside a literal re-enter this arm as a new literal.
                for (_, d) in chars.by_ref() {
                    if d == close {
                        break;
                    }
                }
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                for (_, d) in chars.by_ref() {
                    if d == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = ' ';
                for (_, d) in chars.by_ref() {
                    if prev == '*' && d == '/' {
                        break;
                    }
                    prev = d;
                }
            }
            ';' => {
                let mut rest = &sql[i + 1..];
                loop {
                    rest = strip_leading_comments(rest);
                    match rest.strip_prefix(';') {
                        Some(after) => rest = after,
                        None => return !rest.is_empty(),
                    }
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_reads() {
        let guard = QueryGuard::default();
        assert!(guard.check("SELECT COUNT(*) FROM sales").is_ok());
        assert!(guard.check("  select * from sales;").is_ok());
        assert!(guard.check("WITH t AS (SELECT 1) SELECT * FROM t").is_ok());
        assert!(guard.check("-- totals\nSELECT 1").is_ok());
        assert!(guard.check("/* x */ VALUES (1)").is_ok());
    }

    #[test]
    fn rejects_writes() {
        let guard = QueryGuard::default();
        assert_eq!(
            guard.check("DELETE FROM sales"),
            Err(QueryRejection::NotReadOnly("DELETE".to_string()))
        );
        assert!(guard.check("drop table sales").is_err());
        assert!(guard.check("PRAGMA query_only = OFF").is_err());
    }

    #[test]
    fn second_statement_is_rejected_under_any_policy() {
        for guard in [QueryGuard::default(), QueryGuard::new(QueryPolicy::Unrestricted)] {
            assert_eq!(
                guard.check("SELECT 1; DELETE FROM sales"),
                Err(QueryRejection::MultipleStatements)
            );
            assert_eq!(
                guard.check("SELECT 1;; SELECT 2"),
                Err(QueryRejection::MultipleStatements)
            );
        }
    }

    #[test]
    fn semicolons_in_literals_and_comments_are_not_separators() {
        let guard = QueryGuard::default();
        assert!(guard.check("SELECT * FROM sales WHERE Region = 'a;b'").is_ok());
        assert!(guard.check("SELECT \"x;y\" FROM sales").is_ok());
        assert!(guard.check("SELECT 1 -- one; two\n").is_ok());
        assert!(guard.check("SELECT 1 /* ; */").is_ok());
        assert!(guard.check("SELECT 1; -- done").is_ok());
        assert!(guard.check("SELECT 'it''s'; ").is_ok());
        assert!(guard.check("SELECT 1; ; -- done").is_ok());
    }

    #[test]
    fn empty_text_is_rejected_under_any_policy() {
        assert_eq!(QueryGuard::default().check(" ; "), Err(QueryRejection::Empty));
        let open = QueryGuard::new(QueryPolicy::Unrestricted);
        assert_eq!(open.check("-- nothing"), Err(QueryRejection::Empty));
        assert!(open.check("DELETE FROM sales").is_ok());
    }
}
