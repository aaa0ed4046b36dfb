//! Connection configuration.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::dialect::{DialectOptions, PlaceholderStyle};
use crate::error::{DialectError, Result};
use crate::transaction::IsolationLevel;
use crate::value::UuidStorage;
use crate::version::ServerVersion;

/// Settings for one MySQL session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Default schema.
    pub database: Option<String>,
    /// Login user.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Connection character set.
    pub charset: String,
    /// Connection collation.
    pub collation: Option<String>,
    /// Server-side autocommit. When off, writes outside a transaction are committed
    /// explicitly.
    pub autocommit: bool,
    /// Statement run right after connecting.
    pub init_command: Option<String>,
    /// Session time zone as `+HH:MM`, `-HH:MM` or `UTC`.
    pub timezone: Option<String>,
    /// Pinned server version; detected with `SELECT VERSION()` when absent.
    pub server_version: Option<ServerVersion>,
    /// Version assumed when detection fails. Detection failures are fatal when absent.
    pub fallback_version: Option<ServerVersion>,
    /// Bind placeholder of the driver.
    pub placeholder_style: PlaceholderStyle,
    /// UUID column representation.
    pub uuid_storage: UuidStorage,
    /// Default transaction isolation level.
    pub isolation_level: IsolationLevel,
    /// Log every statement at `info` instead of `debug`.
    pub log_queries: bool,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 3306,
            database: None,
            username: None,
            password: None,
            charset: String::from("utf8mb4"),
            collation: None,
            autocommit: true,
            init_command: Some(String::from("SET sql_mode='STRICT_TRANS_TABLES'")),
            timezone: None,
            server_version: None,
            fallback_version: Some(ServerVersion::DEFAULT),
            placeholder_style: PlaceholderStyle::default(),
            uuid_storage: UuidStorage::default(),
            isolation_level: IsolationLevel::default(),
            log_queries: false,
        }
    }
}

impl MySqlConfig {
    /// Parses and validates a JSON configuration. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the values are usable together.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DialectError::Config(String::from("host must not be empty")));
        }
        if self.port == 0 {
            return Err(DialectError::Config(String::from("port must not be 0")));
        }
        if self.charset.trim().is_empty() {
            return Err(DialectError::Config(String::from(
                "charset must not be empty",
            )));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(DialectError::Config(String::from(
                "password given without username",
            )));
        }
        self.session_offset()?;
        Ok(())
    }

    /// The session time zone as a fixed offset, UTC when unset.
    pub fn session_offset(&self) -> Result<FixedOffset> {
        match self.timezone.as_deref() {
            None => Ok(Utc.fix()),
            Some(tz) => parse_offset(tz)
                .ok_or_else(|| DialectError::Config(format!("invalid timezone '{tz}'"))),
        }
    }

    /// Dialect options derived from this configuration.
    pub fn dialect_options(&self) -> Result<DialectOptions> {
        Ok(DialectOptions {
            placeholder_style: self.placeholder_style,
            uuid_storage: self.uuid_storage,
            session_offset: self.session_offset()?,
        })
    }

    /// A `mysql://` URL for drivers that take one. Credentials and database are
    /// percent-encoded.
    #[must_use]
    pub fn connection_url(&self) -> String {
        let credentials = match (&self.username, &self.password) {
            (Some(user), Some(password)) => format!(
                "{}:{}@",
                urlencoding::encode(user),
                urlencoding::encode(password)
            ),
            (Some(user), None) => format!("{}@", urlencoding::encode(user)),
            _ => String::new(),
        };
        let database = urlencoding::encode(self.database.as_deref().unwrap_or_default());
        format!(
            "mysql://{credentials}{}:{}/{database}?charset={}",
            self.host, self.port, self.charset
        )
    }
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if tz.eq_ignore_ascii_case("UTC") || tz == "Z" {
        return Some(Utc.fix());
    }
    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
