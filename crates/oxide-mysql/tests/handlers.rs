//! Tests for the capability handlers as reached through a dialect.

mod common;
use common::*;

use oxide_mysql::error::{Feature, Limitation};
use oxide_mysql::handlers::{
    CteDefinition, FrameBound, FrameUnit, GroupingKind, JsonOperation, WindowFrame, WindowSpec,
};
use oxide_mysql::{
    Capability, CapabilityHandler, Dialect, DialectError, ExplainFormat, ExplainOptions,
    ServerVersion,
};
use serde_json::json;

#[test]
fn returning_is_never_supported() {
    for (major, minor, patch) in [(5, 5, 62), (5, 7, 44), (8, 0, 0), (8, 0, 36), (9, 1, 0)] {
        let d = dialect(major, minor, patch);
        assert!(!d.supports_returning());
        assert!(!d.returning_handler().is_supported());
        let err = d.returning_handler().render(&["id", "name"]).unwrap_err();
        assert_eq!(err.feature, Feature::Returning);
        assert_eq!(err.limitation, Limitation::Engine);
        assert!(err.to_string().contains("not supported"));
    }
}

#[test]
fn json_operation_refused_before_5_7_8() {
    let d = dialect(5, 6, 0);
    assert!(!d.supports_json());
    let err = d
        .json_handler()
        .format_json_operation("doc", Some("a"), &JsonOperation::Extract, None)
        .unwrap_err();
    assert_eq!(err.feature, Feature::Json);
    assert_eq!(
        err.limitation,
        Limitation::VersionGate {
            required: ServerVersion::new(5, 7, 8),
            current: ServerVersion::new(5, 6, 0),
        }
    );
    let err: DialectError = err.into();
    assert!(matches!(err, DialectError::NotSupported(_)));
}

#[test]
fn json_extract_uses_arrows_from_5_7_13() {
    let extract = |version: (u16, u16, u16), op: &JsonOperation| {
        dialect(version.0, version.1, version.2)
            .json_handler()
            .format_json_operation("doc", Some("user.name"), op, None)
            .unwrap()
    };
    assert_eq!(
        extract((5, 7, 8), &JsonOperation::Extract),
        "JSON_EXTRACT(doc, '$.user.name')"
    );
    assert_eq!(
        extract((5, 7, 8), &JsonOperation::Text),
        "JSON_UNQUOTE(JSON_EXTRACT(doc, '$.user.name'))"
    );
    assert_eq!(
        extract((5, 7, 13), &JsonOperation::Extract),
        "doc->'$.user.name'"
    );
    assert_eq!(
        extract((8, 0, 0), &JsonOperation::Text),
        "doc->>'$.user.name'"
    );
}

#[test]
fn json_modifications_and_alias() {
    let d = dialect(8, 0, 36);
    let json = d.json_handler();
    assert_eq!(
        json.format_json_operation("doc", None, &JsonOperation::Set(json!({"a": 1})), Some("d"))
            .unwrap(),
        "JSON_SET(doc, '$', CAST('{\"a\":1}' AS JSON)) AS d"
    );
    assert_eq!(
        json.format_json_operation("doc", Some("$.n"), &JsonOperation::Insert(json!(3)), None)
            .unwrap(),
        "JSON_INSERT(doc, '$.n', 3)"
    );
    assert_eq!(
        json.format_json_operation("doc", Some("$.tags"), &JsonOperation::ArrayLength, None)
            .unwrap(),
        "JSON_LENGTH(JSON_EXTRACT(doc, '$.tags'))"
    );
    assert_eq!(
        json.format_json_operation("doc", Some("k"), &JsonOperation::Exists, None)
            .unwrap(),
        "JSON_CONTAINS_PATH(doc, 'one', '$.k')"
    );
}

#[test]
fn json_function_availability() {
    let old = dialect(5, 7, 8);
    assert!(old.json_handler().supports_json_function("JSON_EXTRACT"));
    assert!(!old.json_handler().supports_json_function("json_arrayagg"));
    let err = old.json_handler().require_function("JSON_TABLE").unwrap_err();
    assert!(err.is_version_gated());
    assert!(!old
        .json_handler()
        .require_function("json_frobnicate")
        .unwrap_err()
        .is_version_gated());
    assert!(dialect(8, 0, 21)
        .json_handler()
        .require_function("json_value")
        .is_ok());
}

#[test]
fn window_functions_from_8_0() {
    assert!(!dialect(5, 7, 44).supports_window_functions());
    let err = dialect(5, 7, 44)
        .aggregate_handler()
        .format_window_function("ROW_NUMBER()", &WindowSpec::new())
        .unwrap_err();
    assert_eq!(err.feature, Feature::WindowFunction);

    let d = dialect(8, 0, 0);
    let window = WindowSpec::new().order_by("created_at").frame(WindowFrame::new(
        FrameUnit::Range,
        FrameBound::UnboundedPreceding,
    ));
    assert_eq!(
        d.aggregate_handler()
            .format_window_function("SUM(total)", &window)
            .unwrap(),
        "SUM(total) OVER (ORDER BY created_at RANGE UNBOUNDED PRECEDING)"
    );
}

#[test]
fn only_rollup_grouping() {
    let aggregate = *dialect(8, 0, 36).aggregate_handler();
    assert_eq!(
        aggregate
            .format_grouping(GroupingKind::Rollup, &["year", "month"])
            .unwrap(),
        "year, month WITH ROLLUP"
    );
    for kind in [GroupingKind::Cube, GroupingKind::GroupingSets] {
        let err = aggregate.format_grouping(kind, &["a"]).unwrap_err();
        assert_eq!(err.feature, Feature::GroupingSet);
        assert!(!err.is_version_gated());
    }
}

#[test]
fn cte_from_8_0() {
    let ctes = [
        CteDefinition::new("tree", "SELECT id FROM nodes").columns(["id"]).recursive(),
        CteDefinition::new("leaf", "SELECT 1"),
    ];
    assert!(dialect(5, 7, 44)
        .cte_handler()
        .format_with_clause(&ctes, false)
        .is_err());
    assert_eq!(
        dialect(8, 0, 0)
            .cte_handler()
            .format_with_clause(&ctes, false)
            .unwrap(),
        "WITH RECURSIVE tree(id) AS (SELECT id FROM nodes), leaf AS (SELECT 1)"
    );
}

#[test]
fn explain_across_versions() {
    let sql = "SELECT * FROM t";
    assert_eq!(
        dialect(5, 6, 0)
            .format_explain(sql, &ExplainOptions::new().verbose())
            .unwrap(),
        "EXPLAIN EXTENDED SELECT * FROM t"
    );
    assert_eq!(
        dialect(5, 7, 44)
            .format_explain(sql, &ExplainOptions::new().verbose())
            .unwrap(),
        "EXPLAIN /* Note: EXTENDED option is deprecated in MySQL 5.7+ */ SELECT * FROM t"
    );
    assert_eq!(
        dialect(8, 0, 14)
            .format_explain(sql, &ExplainOptions::new().analyze())
            .unwrap(),
        "EXPLAIN ANALYZE FORMAT=TREE SELECT * FROM t"
    );
    assert!(dialect(8, 0, 14)
        .format_explain(
            sql,
            &ExplainOptions::new().analyze().format(ExplainFormat::Json)
        )
        .is_err());
    assert_eq!(
        dialect(8, 0, 18)
            .format_explain(
                sql,
                &ExplainOptions::new().analyze().format(ExplainFormat::Json)
            )
            .unwrap(),
        "EXPLAIN ANALYZE FORMAT=JSON SELECT * FROM t"
    );
    assert_eq!(
        dialect(8, 0, 36)
            .format_explain(sql, &ExplainOptions::new().for_connection(42))
            .unwrap(),
        "EXPLAIN FOR CONNECTION 42"
    );
}

#[test]
fn explain_formats_per_version() {
    assert!(!dialect(5, 6, 4).supports_explain_format(ExplainFormat::Json));
    assert!(dialect(5, 6, 5).supports_explain_format(ExplainFormat::Json));
    assert!(!dialect(8, 0, 15).supports_explain_format(ExplainFormat::Tree));
    assert!(dialect(8, 0, 16).supports_explain_format(ExplainFormat::Tree));
    let err = dialect(8, 0, 15)
        .format_explain("SELECT 1", &ExplainOptions::new().format(ExplainFormat::Tree))
        .unwrap_err();
    assert!(matches!(err, DialectError::NotSupported(_)));
}

#[test]
fn capability_set_follows_version() {
    let old = dialect(5, 7, 44);
    assert!(old.capabilities().supports(Capability::Json));
    assert!(!old.capabilities().supports(Capability::Cte));
    let new = dialect(8, 0, 31);
    assert!(new.capabilities().supports(Capability::SetOperations));
    assert!(!dialect(8, 0, 30)
        .capabilities()
        .supports(Capability::SetOperations));
    assert_eq!(Capability::CheckConstraints.since(), ServerVersion::new(8, 0, 16));
}
