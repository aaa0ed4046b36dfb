//! Lightweight statement classification.
//!
//! This is not a SQL parser. It strips comments, looks at the leading keyword and, for
//! `WITH`, at the first verb outside parentheses.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

// Quoted spans come first so comment markers inside them are left alone.
static COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)'(?:[^'\\]|\\.|'')*'|"(?:[^"\\]|\\.|"")*"|`(?:[^`]|``)*`|/\*.*?\*/|--[^\n]*|#[^\n]*"#,
    )
    .expect("valid comment pattern")
});

static TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[()]|[A-Za-z_]+").expect("valid token pattern"));

static WRITE_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:INSERT\s+(?:IGNORE\s+)?INTO|REPLACE\s+INTO|UPDATE|DELETE\s+FROM)\s+((?:`(?:[^`]|``)+`|[\w$]+)(?:\s*\.\s*(?:`(?:[^`]|``)+`|[\w$]+))*)",
    )
    .expect("valid write target pattern")
});

/// Statement category, from the leading verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Replace,
    Show,
    Describe,
    Explain,
    Analyze,
    /// `CREATE`, `ALTER`, `DROP`, `TRUNCATE`, `RENAME`.
    Ddl,
    /// Anything else, including `SET` and transaction control.
    Other,
}

impl StatementKind {
    /// Classifies `sql`.
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        let code = COMMENTS.replace_all(sql, " ");
        let mut tokens = TOKENS.find_iter(&code).map(|m| m.as_str());
        match tokens.next() {
            Some(word) if word.eq_ignore_ascii_case("WITH") => main_verb(tokens),
            Some(word) => Self::from_keyword(word),
            None => Self::Other,
        }
    }

    fn from_keyword(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "SELECT" => Self::Select,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "REPLACE" => Self::Replace,
            "SHOW" => Self::Show,
            "DESCRIBE" | "DESC" => Self::Describe,
            "EXPLAIN" => Self::Explain,
            "ANALYZE" => Self::Analyze,
            "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" => Self::Ddl,
            _ => Self::Other,
        }
    }

    /// Returns whether the statement produces a result set.
    #[must_use]
    pub const fn returns_rows(self) -> bool {
        matches!(
            self,
            Self::Select | Self::Show | Self::Describe | Self::Explain | Self::Analyze
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// The first verb at parenthesis depth zero; a bare `WITH ... SELECT` is a query.
fn main_verb<'a>(tokens: impl Iterator<Item = &'a str>) -> StatementKind {
    let mut depth = 0_usize;
    for token in tokens {
        match token {
            "(" => depth += 1,
            ")" => depth = depth.saturating_sub(1),
            word if depth == 0 => match StatementKind::from_keyword(word) {
                kind @ (StatementKind::Select
                | StatementKind::Insert
                | StatementKind::Update
                | StatementKind::Delete
                | StatementKind::Replace) => return kind,
                _ => {}
            },
            _ => {}
        }
    }
    StatementKind::Select
}

/// Removes `--`, `#` and `/* */` comments outside string literals and quoted identifiers.
#[must_use]
pub fn strip_comments(sql: &str) -> String {
    COMMENTS
        .replace_all(sql, |caps: &regex::Captures<'_>| {
            let span = &caps[0];
            if span.starts_with(['\'', '"', '`']) {
                span.to_string()
            } else {
                String::from(" ")
            }
        })
        .trim()
        .to_string()
}

/// Returns the table written by an `INSERT`, `REPLACE`, `UPDATE` or `DELETE`, spelled
/// as in the statement: possibly schema-qualified, backticks kept.
#[must_use]
pub fn table_name(sql: &str) -> Option<String> {
    let stripped = strip_comments(sql);
    WRITE_TARGET
        .captures(&stripped)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
