//! Version-derived capability set.

use std::collections::BTreeSet;
use std::fmt;

use crate::version::ServerVersion;

/// A server feature that callers may branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// `SAVEPOINT`, `RELEASE SAVEPOINT`, `ROLLBACK TO SAVEPOINT`.
    Savepoints,
    /// `SET TRANSACTION ISOLATION LEVEL`.
    IsolationLevels,
    /// `INSERT ... VALUES (...), (...)`.
    MultiRowInsert,
    /// `INSERT ... ON DUPLICATE KEY UPDATE`.
    Upsert,
    /// Native `JSON` columns and functions.
    Json,
    /// `->` and `->>`.
    JsonArrows,
    /// `OVER (...)`.
    WindowFunctions,
    /// `WITH`.
    Cte,
    /// `WITH RECURSIVE`.
    RecursiveCte,
    /// Enforced `CHECK` constraints.
    CheckConstraints,
    /// Fractional seconds in temporal columns.
    FractionalSeconds,
    /// `INTERSECT` and `EXCEPT`.
    SetOperations,
    /// `EXPLAIN ANALYZE`.
    ExplainAnalyze,
    /// `EXPLAIN FORMAT=JSON`.
    ExplainJson,
    /// `EXPLAIN FORMAT=TREE`.
    ExplainTree,
    /// `MATCH ... AGAINST` on InnoDB.
    FullTextSearch,
    /// Spatial columns and functions.
    Spatial,
}

impl Capability {
    /// Every capability with the first version that has it.
    pub const TABLE: [(Self, ServerVersion); 17] = [
        (Self::Savepoints, ServerVersion::new(5, 0, 0)),
        (Self::IsolationLevels, ServerVersion::new(5, 0, 0)),
        (Self::MultiRowInsert, ServerVersion::new(5, 0, 0)),
        (Self::Upsert, ServerVersion::new(5, 0, 0)),
        (Self::Spatial, ServerVersion::new(5, 0, 0)),
        (Self::FractionalSeconds, ServerVersion::new(5, 6, 4)),
        (Self::FullTextSearch, ServerVersion::new(5, 6, 4)),
        (Self::ExplainJson, ServerVersion::new(5, 6, 5)),
        (Self::Json, ServerVersion::new(5, 7, 8)),
        (Self::JsonArrows, ServerVersion::new(5, 7, 13)),
        (Self::WindowFunctions, ServerVersion::new(8, 0, 0)),
        (Self::Cte, ServerVersion::new(8, 0, 0)),
        (Self::RecursiveCte, ServerVersion::new(8, 0, 0)),
        (Self::ExplainAnalyze, ServerVersion::new(8, 0, 13)),
        (Self::CheckConstraints, ServerVersion::new(8, 0, 16)),
        (Self::ExplainTree, ServerVersion::new(8, 0, 16)),
        (Self::SetOperations, ServerVersion::new(8, 0, 31)),
    ];

    /// First version that has this capability.
    #[must_use]
    pub fn since(self) -> ServerVersion {
        Self::TABLE
            .iter()
            .find(|(capability, _)| *capability == self)
            .map_or(ServerVersion::DEFAULT, |(_, since)| *since)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The capabilities of one server version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    version: ServerVersion,
    set: BTreeSet<Capability>,
}

impl Capabilities {
    /// Computes the capability set of `version`.
    #[must_use]
    pub fn for_version(version: ServerVersion) -> Self {
        let set = Capability::TABLE
            .iter()
            .filter(|(_, since)| version >= *since)
            .map(|(capability, _)| *capability)
            .collect();
        Self { version, set }
    }

    /// The version the set was computed for.
    #[must_use]
    pub const fn version(&self) -> ServerVersion {
        self.version
    }

    /// Returns whether `capability` is present.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.set.contains(&capability)
    }

    /// Iterates the present capabilities in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.set.iter().copied()
    }
}
