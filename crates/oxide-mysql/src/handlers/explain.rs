//! `EXPLAIN` options and their version matrix.

use std::fmt;

use super::CapabilityHandler;
use crate::error::{Feature, NotSupportedError};
use crate::version::{ServerVersion, VersionGate};

const V5_1_0: ServerVersion = ServerVersion::new(5, 1, 0);
const V5_6_0: ServerVersion = ServerVersion::new(5, 6, 0);
const V5_6_5: ServerVersion = ServerVersion::new(5, 6, 5);
const V5_7_0: ServerVersion = ServerVersion::new(5, 7, 0);
const V8_0_13: ServerVersion = ServerVersion::new(8, 0, 13);
const V8_0_16: ServerVersion = ServerVersion::new(8, 0, 16);
const V8_0_18: ServerVersion = ServerVersion::new(8, 0, 18);
const V8_3_0: ServerVersion = ServerVersion::new(8, 3, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Analyze {
    Unavailable,
    TreeOnly,
    Full,
}

const ANALYZE: VersionGate<Analyze> = VersionGate::new(
    Analyze::Unavailable,
    &[(V8_0_13, Analyze::TreeOnly), (V8_0_18, Analyze::Full)],
);
const PARTITIONS_KEYWORD: VersionGate<bool> = VersionGate::since(&[(V5_1_0, true)]);
const EXTENDED_KEYWORD: VersionGate<bool> = VersionGate::since(&[(V5_6_0, true)]);
// From 5.7 EXTENDED and PARTITIONS output is always included and the keywords are deprecated.
const INFORMATIONAL_MODIFIERS: VersionGate<bool> = VersionGate::since(&[(V5_7_0, true)]);
const FOR_CONNECTION: VersionGate<bool> = VersionGate::since(&[(V5_7_0, true)]);
const FORMAT_JSON: VersionGate<bool> = VersionGate::since(&[(V5_6_5, true)]);
const FORMAT_TREE: VersionGate<bool> = VersionGate::since(&[(V8_0_16, true)]);
const JSON_FORMAT_V2: VersionGate<bool> = VersionGate::since(&[(V8_3_0, true)]);

const EXTENDED_NOTE: &str = "/* Note: EXTENDED option is deprecated in MySQL 5.7+ */";
const PARTITIONS_NOTE: &str = "/* Note: PARTITIONS option is deprecated in MySQL 5.7+ */";
const JSON_V2_NOTE: &str = "/* SET explain_json_format_version = 2 before executing this */";

/// Output format of `EXPLAIN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExplainFormat {
    /// Tabular output.
    #[default]
    Text,
    /// `FORMAT=JSON`.
    Json,
    /// `FORMAT=TREE`.
    Tree,
}

impl fmt::Display for ExplainFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "TEXT",
            Self::Json => "JSON",
            Self::Tree => "TREE",
        })
    }
}

/// What an `EXPLAIN` request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainOptions {
    /// Run the statement and report actual costs.
    pub analyze: bool,
    /// Output format.
    pub format: ExplainFormat,
    /// `EXTENDED` information.
    pub verbose: bool,
    /// `PARTITIONS` information.
    pub partitions: bool,
    /// JSON output format version (1 or 2).
    pub json_version: u8,
    /// Explain the statement running on another connection instead.
    pub connection_id: Option<u64>,
}

impl Default for ExplainOptions {
    fn default() -> Self {
        Self {
            analyze: false,
            format: ExplainFormat::Text,
            verbose: false,
            partitions: false,
            json_version: 1,
            connection_id: None,
        }
    }
}

impl ExplainOptions {
    /// Plain `EXPLAIN` in text format.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests `EXPLAIN ANALYZE`.
    #[must_use]
    pub const fn analyze(mut self) -> Self {
        self.analyze = true;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn format(mut self, format: ExplainFormat) -> Self {
        self.format = format;
        self
    }

    /// Requests `EXTENDED` information.
    #[must_use]
    pub const fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Requests `PARTITIONS` information.
    #[must_use]
    pub const fn partitions(mut self) -> Self {
        self.partitions = true;
        self
    }

    /// Sets the JSON output format version.
    #[must_use]
    pub const fn json_version(mut self, version: u8) -> Self {
        self.json_version = version;
        self
    }

    /// Explains the statement currently running on connection `id`.
    #[must_use]
    pub const fn for_connection(mut self, id: u64) -> Self {
        self.connection_id = Some(id);
        self
    }
}

/// A validated `EXPLAIN` request, ready to be assembled by the dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainPlan {
    /// `EXPLAIN`, `EXPLAIN EXTENDED` or `EXPLAIN PARTITIONS`.
    pub keyword: &'static str,
    /// Whether `ANALYZE` follows the keyword.
    pub analyze: bool,
    /// Comments about informational-only options.
    pub notes: Vec<&'static str>,
    /// Explicit `FORMAT=` clause; `None` for the default text output.
    pub format: Option<ExplainFormat>,
    /// Target of `FOR CONNECTION`.
    pub connection_id: Option<u64>,
}

/// `EXPLAIN` handler for one server version.
#[derive(Debug, Clone, Copy)]
pub struct ExplainHandler {
    version: ServerVersion,
}

impl ExplainHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new(version: ServerVersion) -> Self {
        Self { version }
    }

    fn gated(&self, detail: impl Into<String>, required: ServerVersion) -> NotSupportedError {
        NotSupportedError::version(Feature::Explain, detail, required, self.version)
    }

    /// Formats available at the bound version, `TEXT` first.
    #[must_use]
    pub fn supported_formats(&self) -> Vec<ExplainFormat> {
        let mut formats = vec![ExplainFormat::Text];
        if FORMAT_JSON.select(self.version) {
            formats.push(ExplainFormat::Json);
        }
        if FORMAT_TREE.select(self.version) {
            formats.push(ExplainFormat::Tree);
        }
        formats
    }

    /// Returns whether `format` is available.
    #[must_use]
    pub fn supports_format(&self, format: ExplainFormat) -> bool {
        self.supported_formats().contains(&format)
    }

    /// Validates `options` against the version matrix.
    ///
    /// Between 8.0.13 and 8.0.17 `ANALYZE` only produces tree output: a text request is
    /// promoted to `TREE`, a JSON request fails.
    pub fn plan(&self, options: &ExplainOptions) -> Result<ExplainPlan, NotSupportedError> {
        let v = self.version;
        let mut format = options.format;

        if options.analyze {
            match ANALYZE.select(v) {
                Analyze::Full => {}
                Analyze::TreeOnly => match format {
                    ExplainFormat::Json => {
                        return Err(self.gated(
                            "MySQL 8.0.13-8.0.17 only supports TREE format with EXPLAIN ANALYZE",
                            V8_0_18,
                        ))
                    }
                    ExplainFormat::Text => format = ExplainFormat::Tree,
                    ExplainFormat::Tree => {}
                },
                Analyze::Unavailable => {
                    return Err(self.gated("EXPLAIN ANALYZE is not supported", V8_0_13))
                }
            }
            if options.connection_id.is_some() {
                return Err(NotSupportedError::engine(
                    Feature::Explain,
                    "EXPLAIN ANALYZE cannot be combined with FOR CONNECTION",
                ));
            }
        }

        let informational = INFORMATIONAL_MODIFIERS.select(v);
        let mut keyword = "EXPLAIN";
        let mut notes = Vec::new();
        if options.verbose && options.partitions && !informational {
            return Err(self.gated(
                "EXPLAIN EXTENDED and EXPLAIN PARTITIONS cannot be combined",
                V5_7_0,
            ));
        }
        if options.verbose {
            if informational {
                notes.push(EXTENDED_NOTE);
            } else if EXTENDED_KEYWORD.select(v) {
                keyword = "EXPLAIN EXTENDED";
            } else {
                return Err(self.gated("EXPLAIN EXTENDED is not supported", V5_6_0));
            }
        }
        if options.partitions {
            if informational {
                notes.push(PARTITIONS_NOTE);
            } else if PARTITIONS_KEYWORD.select(v) {
                keyword = "EXPLAIN PARTITIONS";
            } else {
                return Err(self.gated("EXPLAIN PARTITIONS is not supported", V5_1_0));
            }
        }

        let format = match format {
            ExplainFormat::Text => None,
            ExplainFormat::Json => {
                if !FORMAT_JSON.select(v) {
                    return Err(self.gated("EXPLAIN FORMAT=JSON is not supported", V5_6_5));
                }
                match options.json_version {
                    1 => {}
                    2 if JSON_FORMAT_V2.select(v) => notes.push(JSON_V2_NOTE),
                    2 => {
                        return Err(
                            self.gated("EXPLAIN JSON format version 2 is not supported", V8_3_0)
                        )
                    }
                    other => {
                        return Err(NotSupportedError::engine(
                            Feature::Explain,
                            format!("Unknown EXPLAIN JSON format version {other}"),
                        ))
                    }
                }
                Some(ExplainFormat::Json)
            }
            ExplainFormat::Tree => {
                if !FORMAT_TREE.select(v) {
                    return Err(self.gated("EXPLAIN FORMAT=TREE is not supported", V8_0_16));
                }
                Some(ExplainFormat::Tree)
            }
        };

        if options.connection_id.is_some() && !FOR_CONNECTION.select(v) {
            return Err(self.gated("EXPLAIN FOR CONNECTION is not supported", V5_7_0));
        }

        Ok(ExplainPlan {
            keyword,
            analyze: options.analyze,
            notes,
            format,
            connection_id: options.connection_id,
        })
    }
}

impl CapabilityHandler for ExplainHandler {
    fn feature(&self) -> Feature {
        Feature::Explain
    }

    fn is_supported(&self) -> bool {
        true
    }
}
