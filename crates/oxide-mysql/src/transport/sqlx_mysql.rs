//! [`Transport`] for a live `sqlx` MySQL connection.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use sqlx::mysql::{MySqlArguments, MySqlConnection, MySqlDatabaseError, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row, TypeInfo, ValueRef};
use tracing::warn;

use super::{ColumnMeta, ExecOutcome, RowSet, Transport, TransportError, TransportErrorKind};
use crate::dialect::PlaceholderStyle;
use crate::value::WireValue;

// sqlx binds MySQL parameters to `?` only.
const PLACEHOLDER_STYLE: PlaceholderStyle = PlaceholderStyle::Qmark;

const OPEN_TRANSACTION_QUERY: &str = "SELECT COUNT(*) FROM information_schema.innodb_trx \
     WHERE trx_mysql_thread_id = CONNECTION_ID()";

impl From<sqlx::Error> for TransportError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let code = db
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(MySqlDatabaseError::number);
                Self {
                    kind: TransportErrorKind::Server,
                    code,
                    message: db.message().to_string(),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::connection(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::decode(err.to_string())
            }
            other => Self {
                kind: TransportErrorKind::Server,
                code: None,
                message: other.to_string(),
            },
        }
    }
}

// MySQL TIME literal, signed, hours may exceed 23.
fn time_literal(delta: TimeDelta) -> String {
    let micros = delta.num_microseconds().unwrap_or_default();
    let sign = if micros < 0 { "-" } else { "" };
    let micros = micros.unsigned_abs();
    let seconds = micros / 1_000_000;
    format!(
        "{sign}{:02}:{:02}:{:02}.{:06}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
        micros % 1_000_000
    )
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [WireValue],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            WireValue::Null => query.bind(None::<String>),
            WireValue::Int(n) => query.bind(*n),
            WireValue::UInt(n) => query.bind(*n),
            WireValue::Float(f) => query.bind(*f),
            WireValue::Text(s) => query.bind(s.as_str()),
            WireValue::Bytes(b) => query.bind(b.as_slice()),
            WireValue::Date(d) => query.bind(*d),
            WireValue::Time(t) => query.bind(*t),
            WireValue::DateTime(dt) => query.bind(*dt),
            WireValue::Duration(delta) => query.bind(time_literal(*delta)),
        };
    }
    query
}

fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<WireValue, TransportError> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(WireValue::Null);
    }
    let upper = type_name.to_ascii_uppercase();
    let value = if upper.contains("UNSIGNED") {
        WireValue::UInt(row.try_get::<u64, _>(index)?)
    } else {
        match upper.as_str() {
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                WireValue::Int(row.try_get::<i64, _>(index)?)
            }
            "BOOLEAN" => WireValue::Int(i64::from(row.try_get::<bool, _>(index)?)),
            "FLOAT" | "DOUBLE" => WireValue::Float(row.try_get::<f64, _>(index)?),
            "DATE" => WireValue::Date(row.try_get::<NaiveDate, _>(index)?),
            "TIME" => WireValue::Time(row.try_get::<NaiveTime, _>(index)?),
            "DATETIME" | "TIMESTAMP" => WireValue::DateTime(row.try_get::<NaiveDateTime, _>(index)?),
            "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY"
            | "GEOMETRY" | "BIT" => WireValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
            // DECIMAL, JSON, ENUM, SET and the character types all arrive as text.
            _ => WireValue::Text(row.try_get_unchecked::<String, _>(index)?),
        }
    };
    Ok(value)
}

impl Transport for MySqlConnection {
    async fn execute(
        &mut self,
        sql: &str,
        params: &[WireValue],
    ) -> Result<ExecOutcome, TransportError> {
        let result = if params.is_empty() {
            sqlx::raw_sql(sql).execute(&mut *self).await?
        } else {
            bind_all(sqlx::query(sql), params).execute(&mut *self).await?
        };
        let last_insert_id = result.last_insert_id();
        Ok(ExecOutcome {
            affected_rows: result.rows_affected(),
            last_insert_id: (last_insert_id != 0).then_some(last_insert_id),
        })
    }

    async fn query(&mut self, sql: &str, params: &[WireValue]) -> Result<RowSet, TransportError> {
        let rows: Vec<MySqlRow> = if params.is_empty() {
            sqlx::raw_sql(sql).fetch_all(&mut *self).await?
        } else {
            bind_all(sqlx::query(sql), params)
                .fetch_all(&mut *self)
                .await?
        };
        let columns: Vec<ColumnMeta> = rows.first().map_or_else(Vec::new, |row| {
            row.columns()
                .iter()
                .map(|c| ColumnMeta::new(c.name(), c.type_info().name()))
                .collect()
        });
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, meta)| decode_value(row, i, &meta.type_name))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RowSet { columns, rows })
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        sqlx::Connection::ping(self).await?;
        Ok(())
    }

    async fn has_open_transaction(&mut self) -> Result<bool, TransportError> {
        match sqlx::query_scalar::<_, i64>(OPEN_TRANSACTION_QUERY)
            .fetch_one(&mut *self)
            .await
        {
            Ok(count) => Ok(count > 0),
            // Reading innodb_trx needs the PROCESS privilege.
            Err(sqlx::Error::Database(db)) => {
                warn!(error = %db, "Cannot inspect server transactions, assuming none");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn placeholder_style(&self) -> Option<PlaceholderStyle> {
        Some(PLACEHOLDER_STYLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Param;
    use crate::dialect::{DialectOptions, MySqlDialect};
    use crate::version::ServerVersion;

    #[test]
    fn test_statements_reach_sqlx_with_question_marks() {
        let dialect = MySqlDialect::with_options(
            ServerVersion::DEFAULT,
            DialectOptions {
                placeholder_style: PLACEHOLDER_STYLE,
                ..DialectOptions::default()
            },
        );
        let built = dialect
            .build(
                "SELECT * FROM t WHERE a = %s AND b LIKE '50%%' AND c = %s",
                vec![Param::value(1_i64), Param::value("x")],
            )
            .unwrap();
        assert_eq!(built.sql, "SELECT * FROM t WHERE a = ? AND b LIKE '50%' AND c = ?");
        assert!(!built.sql.contains("%s"));
    }

    #[test]
    fn test_time_literal() {
        assert_eq!(time_literal(TimeDelta::seconds(3661)), "01:01:01.000000");
        assert_eq!(
            time_literal(-TimeDelta::seconds(30 * 3600)),
            "-30:00:00.000000"
        );
        assert_eq!(
            time_literal(TimeDelta::microseconds(1_500_000)),
            "00:00:01.500000"
        );
    }
}
