//! JSON operations and function availability.

use std::collections::HashSet;

use serde_json::Value;

use super::CapabilityHandler;
use crate::error::{Feature, NotSupportedError};
use crate::value::quote_literal;
use crate::version::{ServerVersion, VersionGate};

const V5_7_8: ServerVersion = ServerVersion::new(5, 7, 8);
const V5_7_13: ServerVersion = ServerVersion::new(5, 7, 13);
const V5_7_22: ServerVersion = ServerVersion::new(5, 7, 22);
const V8_0_4: ServerVersion = ServerVersion::new(8, 0, 4);
const V8_0_21: ServerVersion = ServerVersion::new(8, 0, 21);

const JSON: VersionGate<bool> = VersionGate::since(&[(V5_7_8, true)]);
const ARROWS: VersionGate<bool> = VersionGate::since(&[(V5_7_13, true)]);

/// First version providing each JSON function or operator.
const FUNCTIONS: &[(&str, ServerVersion)] = &[
    ("json_array", V5_7_8),
    ("json_array_append", V5_7_8),
    ("json_array_insert", V5_7_8),
    ("json_contains", V5_7_8),
    ("json_contains_path", V5_7_8),
    ("json_depth", V5_7_8),
    ("json_extract", V5_7_8),
    ("json_insert", V5_7_8),
    ("json_keys", V5_7_8),
    ("json_length", V5_7_8),
    ("json_merge", V5_7_8),
    ("json_object", V5_7_8),
    ("json_quote", V5_7_8),
    ("json_remove", V5_7_8),
    ("json_replace", V5_7_8),
    ("json_search", V5_7_8),
    ("json_set", V5_7_8),
    ("json_type", V5_7_8),
    ("json_unquote", V5_7_8),
    ("json_valid", V5_7_8),
    ("json_merge_patch", V5_7_22),
    ("json_merge_preserve", V5_7_22),
    ("json_pretty", V5_7_22),
    ("json_storage_size", V5_7_22),
    ("json_arrayagg", V5_7_22),
    ("json_objectagg", V5_7_22),
    ("json_table", V8_0_4),
    ("json_overlaps", V8_0_21),
    ("json_value", V8_0_21),
    ("->", V5_7_8),
    ("->>", V5_7_13),
];

/// A JSON operation on one path of a column.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonOperation {
    /// The JSON value at the path.
    Extract,
    /// The unquoted text at the path.
    Text,
    /// Whether the path contains the value.
    Contains(Value),
    /// Whether the path exists.
    Exists,
    /// `JSON_TYPE` of the value at the path.
    Type,
    /// The document without the path.
    Remove,
    /// The document with the value inserted where the path is absent.
    Insert(Value),
    /// The document with the value replaced where the path is present.
    Replace(Value),
    /// The document with the value inserted or replaced.
    Set(Value),
    /// Length of the array at the path.
    ArrayLength,
    /// Keys of the object at the path.
    Keys,
}

/// JSON handler for one server version.
#[derive(Debug, Clone)]
pub struct JsonHandler {
    version: ServerVersion,
    supported: bool,
    arrows: bool,
    functions: HashSet<&'static str>,
}

impl JsonHandler {
    /// Resolves JSON support and the available functions for `version`.
    #[must_use]
    pub fn new(version: ServerVersion) -> Self {
        let supported = JSON.select(version);
        let functions = if supported {
            FUNCTIONS
                .iter()
                .filter(|(_, since)| version >= *since)
                .map(|(name, _)| *name)
                .collect()
        } else {
            HashSet::new()
        };
        Self {
            version,
            supported,
            arrows: ARROWS.select(version),
            functions,
        }
    }

    /// Returns whether `->` and `->>` are available.
    #[must_use]
    pub const fn supports_arrows(&self) -> bool {
        self.arrows
    }

    /// Returns whether a JSON function or operator exists at the bound version.
    ///
    /// Names are case-insensitive. Unknown names are reported as unsupported.
    #[must_use]
    pub fn supports_json_function(&self, name: &str) -> bool {
        self.functions.contains(name.to_ascii_lowercase().as_str())
    }

    /// Fails unless the JSON function or operator is available.
    pub fn require_function(&self, name: &str) -> Result<(), NotSupportedError> {
        if self.supports_json_function(name) {
            return Ok(());
        }
        let lower = name.to_ascii_lowercase();
        match FUNCTIONS.iter().find(|(candidate, _)| *candidate == lower) {
            Some((_, since)) => Err(NotSupportedError::version(
                Feature::Json,
                format!("JSON function {name} is not supported in MySQL {}", self.version),
                (*since).max(V5_7_8),
                self.version,
            )),
            None => Err(NotSupportedError::engine(
                Feature::Json,
                format!("Unknown JSON function {name}"),
            )),
        }
    }

    /// Renders `operation` on `column` at `path` (`$` when absent).
    ///
    /// Paths without a leading `$` are taken relative to the root. From 5.7.13 `Extract`
    /// and `Text` use the `->`/`->>` operators.
    pub fn format_json_operation(
        &self,
        column: &str,
        path: Option<&str>,
        operation: &JsonOperation,
        alias: Option<&str>,
    ) -> Result<String, NotSupportedError> {
        if !self.supported {
            return Err(NotSupportedError::version(
                Feature::Json,
                format!("JSON operations are not supported in MySQL {}", self.version),
                V5_7_8,
                self.version,
            ));
        }
        let path = match path {
            None | Some("") => String::from("$"),
            Some(p) if p.starts_with('$') => String::from(p),
            Some(p) => format!("$.{p}"),
        };
        let quoted = quote_literal(&path);

        let expr = match operation {
            JsonOperation::Extract if self.arrows => format!("{column}->{quoted}"),
            JsonOperation::Text if self.arrows => format!("{column}->>{quoted}"),
            JsonOperation::Extract => format!("JSON_EXTRACT({column}, {quoted})"),
            JsonOperation::Text => format!("JSON_UNQUOTE(JSON_EXTRACT({column}, {quoted}))"),
            JsonOperation::Contains(value) => format!(
                "JSON_CONTAINS({column}, {}, {quoted})",
                quote_literal(&value.to_string())
            ),
            JsonOperation::Exists => format!("JSON_CONTAINS_PATH({column}, 'one', {quoted})"),
            JsonOperation::Type => format!("JSON_TYPE(JSON_EXTRACT({column}, {quoted}))"),
            JsonOperation::Remove => format!("JSON_REMOVE({column}, {quoted})"),
            JsonOperation::Insert(value) => {
                format!("JSON_INSERT({column}, {quoted}, {})", json_argument(value))
            }
            JsonOperation::Replace(value) => {
                format!("JSON_REPLACE({column}, {quoted}, {})", json_argument(value))
            }
            JsonOperation::Set(value) => {
                format!("JSON_SET({column}, {quoted}, {})", json_argument(value))
            }
            JsonOperation::ArrayLength => {
                format!("JSON_LENGTH(JSON_EXTRACT({column}, {quoted}))")
            }
            JsonOperation::Keys => format!("JSON_KEYS(JSON_EXTRACT({column}, {quoted}))"),
        };
        Ok(match alias {
            Some(alias) => format!("{expr} AS {alias}"),
            None => expr,
        })
    }
}

// Objects and arrays must be cast or MySQL stores them as strings.
fn json_argument(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => {
            format!("CAST({} AS JSON)", quote_literal(&value.to_string()))
        }
        Value::String(_) => quote_literal(&value.to_string()),
        Value::Null | Value::Bool(_) | Value::Number(_) => value.to_string(),
    }
}

impl CapabilityHandler for JsonHandler {
    fn feature(&self) -> Feature {
        Feature::Json
    }

    fn is_supported(&self) -> bool {
        self.supported
    }
}
