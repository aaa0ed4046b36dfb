//! Server versions and version-gated behavior tables.
//!
//! Every capability decision in this crate is a function of a [`ServerVersion`].
//! Instead of comparing tuples inline, each feature declares a [`VersionGate`]: a
//! baseline variant plus an ascending list of `(threshold, variant)` steps. The gate is
//! resolved once when a dialect is constructed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DialectError;

/// A MySQL server version, compared lexicographically as `(major, minor, patch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
    /// Patch version.
    pub patch: u16,
}

impl ServerVersion {
    /// Version assumed when nothing better is known.
    pub const DEFAULT: Self = Self::new(8, 0, 0);

    /// Creates a version from its three components.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses a server version string such as `8.0.26-log` or `5.7.44-0ubuntu0.18.04.1`.
    ///
    /// Everything after the first `-` is ignored, missing components default to 0.
    pub fn parse(raw: &str) -> Result<Self, DialectError> {
        let core = raw.trim().split('-').next().unwrap_or_default();
        let mut parts = [0_u16; 3];
        let mut seen = 0;
        for (slot, piece) in parts.iter_mut().zip(core.split('.')) {
            // "5.7.44a" style suffixes end the numeric part.
            let digits: String = piece.chars().take_while(char::is_ascii_digit).collect();
            if digits.is_empty() {
                break;
            }
            *slot = digits
                .parse()
                .map_err(|_| DialectError::InvalidVersion(raw.to_string()))?;
            seen += 1;
        }
        if seen == 0 {
            return Err(DialectError::InvalidVersion(raw.to_string()));
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }

    /// Returns the version as a tuple.
    #[must_use]
    pub const fn as_tuple(self) -> (u16, u16, u16) {
        (self.major, self.minor, self.patch)
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<(u16, u16, u16)> for ServerVersion {
    fn from((major, minor, patch): (u16, u16, u16)) -> Self {
        Self::new(major, minor, patch)
    }
}

impl FromStr for ServerVersion {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ServerVersion {
    type Error = DialectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServerVersion> for String {
    fn from(value: ServerVersion) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// An ordered table of `(threshold, variant)` steps for one feature.
///
/// Steps must be sorted by ascending threshold. Versions below the first threshold get
/// the baseline.
#[derive(Debug, Clone, Copy)]
pub struct VersionGate<T: 'static> {
    baseline: T,
    steps: &'static [(ServerVersion, T)],
}

impl<T: 'static> VersionGate<T> {
    /// Creates a gate.
    #[must_use]
    pub const fn new(baseline: T, steps: &'static [(ServerVersion, T)]) -> Self {
        Self { baseline, steps }
    }

    /// Returns the configured steps.
    #[must_use]
    pub const fn steps(&self) -> &'static [(ServerVersion, T)] {
        self.steps
    }
}

impl<T: Copy + PartialEq + 'static> VersionGate<T> {
    /// Picks the variant of the highest threshold not above `version`.
    #[must_use]
    pub fn select(&self, version: ServerVersion) -> T {
        self.steps
            .iter()
            .rev()
            .find(|(threshold, _)| version >= *threshold)
            .map_or(self.baseline, |(_, variant)| *variant)
    }

    /// Returns the first threshold at which `variant` becomes active, if any.
    #[must_use]
    pub fn minimum_for(&self, variant: T) -> Option<ServerVersion> {
        if self.baseline == variant {
            return Some(ServerVersion::new(0, 0, 0));
        }
        self.steps
            .iter()
            .find(|(_, candidate)| *candidate == variant)
            .map(|(threshold, _)| *threshold)
    }
}

impl VersionGate<bool> {
    /// Creates an on/off gate that starts disabled.
    #[must_use]
    pub const fn since(steps: &'static [(ServerVersion, bool)]) -> Self {
        Self::new(false, steps)
    }

    /// Returns the threshold at which the gate switches on.
    #[must_use]
    pub fn required(&self) -> Option<ServerVersion> {
        self.minimum_for(true)
    }
}
