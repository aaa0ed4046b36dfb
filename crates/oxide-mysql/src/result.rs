//! Decoded rows and statement outcomes.

use std::time::Duration;

use crate::value::SqlValue;

/// One decoded row: column names mapped to values, in projection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Builds a row from projected columns, resolving duplicate names.
    ///
    /// The first non-null value keeps the plain name. A later non-null value under the
    /// same name is stored as `name_1`, `name_2`, and so on; a later null is dropped.
    /// A null already stored under the plain name is replaced by the first non-null
    /// value that arrives for it.
    pub fn from_columns<I>(columns: I) -> Self
    where
        I: IntoIterator<Item = (String, SqlValue)>,
    {
        let mut row = Self::default();
        for (name, value) in columns {
            row.push(name, value);
        }
        row
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    fn push(&mut self, name: String, value: SqlValue) {
        let Some(index) = self.position(&name) else {
            self.columns.push((name, value));
            return;
        };
        if value.is_null() {
            return;
        }
        if self.columns[index].1.is_null() {
            self.columns[index].1 = value;
            return;
        }
        let mut suffix = 1_usize;
        let renamed = loop {
            let candidate = format!("{name}_{suffix}");
            if self.position(&candidate).is_none() {
                break candidate;
            }
            suffix += 1;
        };
        self.columns.push((renamed, value));
    }

    /// Value of column `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.position(name).map(|i| &self.columns[i].1)
    }

    /// Column names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Name/value pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Consumes the row into its name/value pairs.
    #[must_use]
    pub fn into_columns(self) -> Vec<(String, SqlValue)> {
        self.columns
    }
}

/// Outcome of one executed statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows for statements that return them, `None` otherwise.
    pub rows: Option<Vec<Row>>,
    /// Rows changed, or rows returned for queries.
    pub affected_rows: u64,
    /// Generated key of the last inserted row.
    pub last_insert_id: Option<u64>,
    /// Wall time spent in the driver.
    pub duration: Duration,
}

impl QueryResult {
    /// The first row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.as_ref().and_then(|rows| rows.first())
    }

    /// Takes the rows out, empty for statements without a result set.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows.unwrap_or_default()
    }
}
