//! URL helpers used by component transforms

use std::str::FromStr;

use ess_values::{kind_of, Value};
use url::Url;

use crate::error::TransformError;

/// Connection settings carried by a PostgreSQL URI
///
/// Only components present in the URI are set. User and password are kept
/// exactly as written, percent-encoding included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostgresUri {
    /// Server host
    pub host: Option<String>,
    /// Server port
    pub port: Option<u16>,
    /// Role name
    pub user: Option<String>,
    /// Role password
    pub password: Option<String>,
    /// Database name
    pub database: Option<String>,
    /// `sslmode` query parameter
    pub ssl_mode: Option<String>,
}

impl FromStr for PostgresUri {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !(s.starts_with("postgresql://") || s.starts_with("postgres://")) {
            return Err(TransformError::invalid_value(s, "not a PostgreSQL URI"));
        }
        let url = Url::parse(s).map_err(|e| TransformError::invalid_value(s, e.to_string()))?;

        let non_empty = |v: &str| (!v.is_empty()).then(|| v.to_string());
        Ok(Self {
            host: url.host_str().and_then(non_empty),
            port: url.port(),
            user: non_empty(url.username()),
            password: url.password().and_then(non_empty),
            database: non_empty(url.path().trim_start_matches('/')),
            ssl_mode: url
                .query_pairs()
                .find(|(k, _)| k == "sslmode")
                .map(|(_, v)| v.into_owned()),
        })
    }
}

/// Borrow a string value or fail with the value's kind
///
/// # Errors
/// [`TransformError::UnexpectedType`] for anything but a string.
pub fn expect_str(value: &Value) -> Result<&str, TransformError> {
    value
        .as_str()
        .ok_or_else(|| TransformError::unexpected_type("string", kind_of(value)))
}

/// Host name of an absolute URL
///
/// # Errors
/// Fails for unparseable URLs and URLs without a host.
pub fn extract_hostname(url: &str) -> Result<String, TransformError> {
    let parsed = Url::parse(url).map_err(|e| TransformError::invalid_value(url, e.to_string()))?;
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TransformError::invalid_value(url, "URL has no host"))
}

/// Transform mapping a URL value to its host name
///
/// # Errors
/// See [`extract_hostname`].
pub fn hostname_transform(value: &Value) -> Result<Value, TransformError> {
    extract_hostname(expect_str(value)?).map(Value::String)
}
