//! Capability handlers.
//!
//! Each handler is bound to one [`ServerVersion`](crate::version::ServerVersion) and
//! resolves its gates when constructed. `is_supported` is a field read afterwards.
//! Rendering methods never produce SQL the bound server would reject; they return a
//! [`NotSupportedError`](crate::error::NotSupportedError) instead.

mod aggregate;
mod cte;
mod explain;
mod json;
mod returning;

pub use aggregate::{
    AggregateHandler, FrameBound, FrameExclusion, FrameUnit, GroupingKind, WindowFrame,
    WindowSpec,
};
pub use cte::{CteDefinition, CteHandler};
pub use explain::{ExplainFormat, ExplainHandler, ExplainOptions, ExplainPlan};
pub use json::{JsonHandler, JsonOperation};
pub use returning::{FallbackPlan, ReturningHandler, WriteKind};

use crate::error::Feature;

/// Common surface of the capability handlers.
pub trait CapabilityHandler {
    /// The feature this handler answers for.
    fn feature(&self) -> Feature;

    /// Returns whether the feature can be rendered at all at the bound version.
    fn is_supported(&self) -> bool;
}
