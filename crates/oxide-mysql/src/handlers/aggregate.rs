//! Window functions and grouping extensions.

use std::fmt;

use super::CapabilityHandler;
use crate::error::{Feature, NotSupportedError};
use crate::version::{ServerVersion, VersionGate};

const V8_0_0: ServerVersion = ServerVersion::new(8, 0, 0);
const V8_0_2: ServerVersion = ServerVersion::new(8, 0, 2);

const WINDOW_FUNCTIONS: VersionGate<bool> = VersionGate::since(&[(V8_0_0, true)]);
const GROUPS_FRAME: VersionGate<bool> = VersionGate::since(&[(V8_0_2, true)]);

/// Unit of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnit {
    /// Physical rows.
    Rows,
    /// Logical range over the ordering value.
    Range,
    /// Peer groups.
    Groups,
}

impl fmt::Display for FrameUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rows => "ROWS",
            Self::Range => "RANGE",
            Self::Groups => "GROUPS",
        })
    }
}

/// One end of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    /// `UNBOUNDED PRECEDING`.
    UnboundedPreceding,
    /// `n PRECEDING`.
    Preceding(u64),
    /// `CURRENT ROW`.
    CurrentRow,
    /// `n FOLLOWING`.
    Following(u64),
    /// `UNBOUNDED FOLLOWING`.
    UnboundedFollowing,
}

impl fmt::Display for FrameBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundedPreceding => f.write_str("UNBOUNDED PRECEDING"),
            Self::Preceding(n) => write!(f, "{n} PRECEDING"),
            Self::CurrentRow => f.write_str("CURRENT ROW"),
            Self::Following(n) => write!(f, "{n} FOLLOWING"),
            Self::UnboundedFollowing => f.write_str("UNBOUNDED FOLLOWING"),
        }
    }
}

/// Frame exclusion. MySQL implements none of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameExclusion {
    /// `EXCLUDE CURRENT ROW`.
    CurrentRow,
    /// `EXCLUDE GROUP`.
    Group,
    /// `EXCLUDE TIES`.
    Ties,
    /// `EXCLUDE NO OTHERS`.
    NoOthers,
}

/// A window frame clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFrame {
    /// Frame unit.
    pub unit: FrameUnit,
    /// Start bound.
    pub start: FrameBound,
    /// End bound; `BETWEEN start AND end` when set.
    pub end: Option<FrameBound>,
    /// Exclusion, always refused.
    pub exclude: Option<FrameExclusion>,
}

impl WindowFrame {
    /// A frame with only a start bound.
    #[must_use]
    pub const fn new(unit: FrameUnit, start: FrameBound) -> Self {
        Self {
            unit,
            start,
            end: None,
            exclude: None,
        }
    }

    /// A `BETWEEN start AND end` frame.
    #[must_use]
    pub const fn between(unit: FrameUnit, start: FrameBound, end: FrameBound) -> Self {
        Self {
            unit,
            start,
            end: Some(end),
            exclude: None,
        }
    }

    /// Adds an exclusion.
    #[must_use]
    pub const fn exclude(mut self, exclusion: FrameExclusion) -> Self {
        self.exclude = Some(exclusion);
        self
    }
}

/// The `OVER (...)` specification of a window function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSpec {
    /// `PARTITION BY` expressions.
    pub partition_by: Vec<String>,
    /// `ORDER BY` expressions, including direction.
    pub order_by: Vec<String>,
    /// Frame clause.
    pub frame: Option<WindowFrame>,
}

impl WindowSpec {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `PARTITION BY` expression.
    #[must_use]
    pub fn partition_by(mut self, expr: impl Into<String>) -> Self {
        self.partition_by.push(expr.into());
        self
    }

    /// Adds an `ORDER BY` expression.
    #[must_use]
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    /// Sets the frame.
    #[must_use]
    pub fn frame(mut self, frame: WindowFrame) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// Grouping extension requested for `GROUP BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingKind {
    /// `ROLLUP`, rendered with MySQL's `WITH ROLLUP` suffix.
    Rollup,
    /// `CUBE`.
    Cube,
    /// `GROUPING SETS`.
    GroupingSets,
}

impl fmt::Display for GroupingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rollup => "ROLLUP",
            Self::Cube => "CUBE",
            Self::GroupingSets => "GROUPING SETS",
        })
    }
}

/// Aggregate and window handler for one server version.
#[derive(Debug, Clone, Copy)]
pub struct AggregateHandler {
    version: ServerVersion,
    window_functions: bool,
    groups_frame: bool,
}

impl AggregateHandler {
    /// Resolves the window gates for `version`.
    #[must_use]
    pub fn new(version: ServerVersion) -> Self {
        Self {
            version,
            window_functions: WINDOW_FUNCTIONS.select(version),
            groups_frame: GROUPS_FRAME.select(version),
        }
    }

    /// Returns whether `OVER (...)` is available.
    #[must_use]
    pub const fn supports_window_functions(&self) -> bool {
        self.window_functions
    }

    /// Renders `expr OVER (...)`.
    pub fn format_window_function(
        &self,
        expr: &str,
        window: &WindowSpec,
    ) -> Result<String, NotSupportedError> {
        if !self.window_functions {
            return Err(NotSupportedError::version(
                Feature::WindowFunction,
                format!("Window functions not supported in MySQL {}", self.version),
                V8_0_0,
                self.version,
            ));
        }

        let mut parts = Vec::new();
        if !window.partition_by.is_empty() {
            parts.push(format!("PARTITION BY {}", window.partition_by.join(", ")));
        }
        if !window.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", window.order_by.join(", ")));
        }
        if let Some(frame) = &window.frame {
            if frame.unit == FrameUnit::Groups && !self.groups_frame {
                return Err(NotSupportedError::version(
                    Feature::WindowFunction,
                    "GROUPS frame type is not supported",
                    V8_0_2,
                    self.version,
                ));
            }
            if let Some(exclusion) = frame.exclude {
                return Err(NotSupportedError::engine(
                    Feature::WindowFunction,
                    format!("EXCLUDE options not supported in MySQL (requested {exclusion:?})"),
                ));
            }
            parts.push(match frame.end {
                Some(end) => format!("{} BETWEEN {} AND {end}", frame.unit, frame.start),
                None => format!("{} {}", frame.unit, frame.start),
            });
        }
        Ok(format!("{expr} OVER ({})", parts.join(" ")))
    }

    /// Renders the `GROUP BY` body for a grouping extension.
    ///
    /// Only `ROLLUP` exists, as `a, b WITH ROLLUP`.
    pub fn format_grouping(
        &self,
        kind: GroupingKind,
        columns: &[&str],
    ) -> Result<String, NotSupportedError> {
        match kind {
            GroupingKind::Rollup => Ok(format!("{} WITH ROLLUP", columns.join(", "))),
            GroupingKind::Cube | GroupingKind::GroupingSets => Err(NotSupportedError::engine(
                Feature::GroupingSet,
                format!(
                    "{kind} not supported in MySQL {}. Only ROLLUP is available using WITH ROLLUP syntax",
                    self.version
                ),
            )),
        }
    }
}

impl CapabilityHandler for AggregateHandler {
    fn feature(&self) -> Feature {
        Feature::WindowFunction
    }

    fn is_supported(&self) -> bool {
        self.window_functions
    }
}
