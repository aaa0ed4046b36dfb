//! Common table expressions.

use tracing::warn;

use super::CapabilityHandler;
use crate::error::{Feature, NotSupportedError};
use crate::version::{ServerVersion, VersionGate};

const V8_0_0: ServerVersion = ServerVersion::new(8, 0, 0);

const CTE: VersionGate<bool> = VersionGate::since(&[(V8_0_0, true)]);

/// One `name(columns) AS (query)` entry of a `WITH` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CteDefinition {
    /// CTE name.
    pub name: String,
    /// Body query.
    pub query: String,
    /// Optional column list.
    pub columns: Vec<String>,
    /// Whether the CTE references itself.
    pub recursive: bool,
    /// `MATERIALIZED`/`NOT MATERIALIZED` hint. MySQL has no such hint.
    pub materialized: Option<bool>,
}

impl CteDefinition {
    /// Creates a non-recursive CTE.
    #[must_use]
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            columns: Vec::new(),
            recursive: false,
            materialized: None,
        }
    }

    /// Sets the column list.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the CTE recursive.
    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Requests a materialization hint.
    #[must_use]
    pub fn materialized(mut self, materialized: bool) -> Self {
        self.materialized = Some(materialized);
        self
    }
}

/// CTE handler for one server version.
#[derive(Debug, Clone, Copy)]
pub struct CteHandler {
    version: ServerVersion,
    supported: bool,
}

impl CteHandler {
    /// Resolves CTE support for `version`.
    #[must_use]
    pub fn new(version: ServerVersion) -> Self {
        Self {
            version,
            supported: CTE.select(version),
        }
    }

    fn require(&self) -> Result<(), NotSupportedError> {
        if self.supported {
            Ok(())
        } else {
            Err(NotSupportedError::version(
                Feature::Cte,
                format!("CTEs not supported in MySQL {}", self.version),
                V8_0_0,
                self.version,
            ))
        }
    }

    /// Renders `name(cols) AS (query)`.
    pub fn format_cte(&self, cte: &CteDefinition) -> Result<String, NotSupportedError> {
        self.require()?;
        if cte.materialized.is_some() {
            warn!(cte = %cte.name, "Materialization hints not supported in MySQL, ignoring");
        }
        let columns = if cte.columns.is_empty() {
            String::new()
        } else {
            format!("({})", cte.columns.join(", "))
        };
        Ok(format!("{}{columns} AS ({})", cte.name, cte.query))
    }

    /// Renders a full `WITH` clause. `RECURSIVE` is added once if any entry needs it.
    pub fn format_with_clause(
        &self,
        ctes: &[CteDefinition],
        recursive: bool,
    ) -> Result<String, NotSupportedError> {
        self.require()?;
        if ctes.is_empty() {
            return Ok(String::new());
        }
        let keyword = if recursive || ctes.iter().any(|c| c.recursive) {
            "RECURSIVE "
        } else {
            ""
        };
        let body = ctes
            .iter()
            .map(|cte| self.format_cte(cte))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        Ok(format!("WITH {keyword}{body}"))
    }
}

impl CapabilityHandler for CteHandler {
    fn feature(&self) -> Feature {
        Feature::Cte
    }

    fn is_supported(&self) -> bool {
        self.supported
    }
}
