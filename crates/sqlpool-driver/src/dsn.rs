//! Connection descriptor (DSN) parsing.
//!
//! Two shapes are accepted:
//!
//! ```text
//! scheme://host:port/dbname?k1=v1&k2=v2        (network-backed schemes)
//! scheme:///path/to/file?k1=v1&k2=v2           (file-backed schemes)
//! ```
//!
//! The scheme is lower-cased. An empty host segment means the remainder up
//! to `?` is a filesystem path. File-backed schemes such as `sqlite` take
//! everything after `://` as the path, so `sqlite://app.db` names a relative
//! file. Parameters are copied verbatim (no URL decoding) and the last
//! occurrence of a key wins.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DriverError;

/// Schemes whose location is always a filesystem path.
pub const FILE_SCHEMES: &[&str] = &["sqlite"];

/// Parameter keys whose values are never printed.
const REDACTED_KEYS: &[&str] = &["password", "pwd"];

/// A parsed connection descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct Dsn {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    database: String,
    params: HashMap<String, String>,
}

impl Dsn {
    /// Parse a connection string.
    ///
    /// Any missing or invalid field yields [`DriverError::MalformedDsn`]
    /// naming that field.
    pub fn parse(input: &str) -> Result<Self, DriverError> {
        let input = input.trim_matches(|c: char| c.is_whitespace() || c.is_control());
        if input.is_empty() {
            return Err(DriverError::malformed("scheme", "connection string is empty"));
        }

        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| DriverError::malformed("scheme", "expected `scheme://`"))?;
        if scheme.is_empty() {
            return Err(DriverError::malformed("scheme", "no database type specified"));
        }
        if !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(DriverError::malformed(
                "scheme",
                format!("invalid character in `{scheme}`"),
            ));
        }
        let scheme = scheme.to_ascii_lowercase();

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };

        let (host, port, database) =
            if FILE_SCHEMES.contains(&scheme.as_str()) || location.starts_with('/') {
                if location.is_empty() || location == "/" {
                    return Err(DriverError::malformed("path", "no database file specified"));
                }
                (None, None, location.to_string())
            } else {
                let (host, port, database) = parse_network_location(location)?;
                (Some(host), Some(port), database)
            };

        let params = query.map(parse_params).unwrap_or_default();

        Ok(Self {
            scheme,
            host,
            port,
            database,
            params,
        })
    }

    /// The lower-cased scheme, e.g. `sqlite` or `mysql`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host, absent for file-backed DSNs.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The port, absent for file-backed DSNs.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// The database name, or the filesystem path for file-backed DSNs.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Whether the DSN names a file rather than a network endpoint.
    #[must_use]
    pub fn is_file_backed(&self) -> bool {
        self.host.is_none()
    }

    /// Look up a parameter value.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Iterate over all parameters in no particular order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    fn sorted_params(&self) -> Vec<(&str, &str)> {
        let mut params: Vec<_> = self.params().collect();
        params.sort_unstable();
        params
    }
}

// host:port/dbname
fn parse_network_location(location: &str) -> Result<(String, u16, String), DriverError> {
    let (authority, database) = match location.split_once('/') {
        Some((authority, database)) => (authority, Some(database)),
        None => (location, None),
    };

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };
    if host.is_empty() {
        return Err(DriverError::malformed("host", "no host specified"));
    }

    let port = port
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DriverError::malformed("port", "no port specified"))?;
    let port: u16 = port
        .parse()
        .map_err(|_| DriverError::malformed("port", format!("invalid port `{port}`")))?;

    let database = database
        .filter(|d| !d.is_empty())
        .ok_or_else(|| DriverError::malformed("database", "no database name specified"))?;

    Ok((host.to_string(), port, database.to_string()))
}

fn parse_params(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                params.insert(key.to_string(), value.to_string());
            }
            _ => {
                let key = pair.split('=').next().unwrap_or_default();
                tracing::debug!(key = key, "ignoring malformed DSN parameter");
            }
        }
    }
    params
}

impl FromStr for Dsn {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        match (&self.host, self.port) {
            (Some(host), Some(port)) => write!(f, "{host}:{port}/{}", self.database)?,
            _ => f.write_str(&self.database)?,
        }
        for (i, (key, value)) in self.sorted_params().into_iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            if REDACTED_KEYS.contains(&key) {
                write!(f, "{sep}{key}=***")?;
            } else {
                write!(f, "{sep}{key}={value}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<_> = self
            .sorted_params()
            .into_iter()
            .map(|(k, v)| if REDACTED_KEYS.contains(&k) { (k, "***") } else { (k, v) })
            .collect();
        f.debug_struct("Dsn")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("params", &params)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn field_of(err: DriverError) -> &'static str {
        match err {
            DriverError::MalformedDsn { field, .. } => field,
            other => panic!("expected MalformedDsn, got {other:?}"),
        }
    }

    #[test]
    fn test_sqlite_absolute_path() {
        let dsn = Dsn::parse("sqlite:///tmp/x.db?synchronous=normal&heap_limit=8000").unwrap();
        assert_eq!(dsn.scheme(), "sqlite");
        assert_eq!(dsn.database(), "/tmp/x.db");
        assert_eq!(dsn.host(), None);
        assert_eq!(dsn.port(), None);
        assert!(dsn.is_file_backed());
        assert_eq!(dsn.param("synchronous"), Some("normal"));
        assert_eq!(dsn.param("heap_limit"), Some("8000"));
        assert_eq!(dsn.param_count(), 2);
    }

    #[test]
    fn test_mysql_network() {
        let dsn =
            Dsn::parse("mysql://localhost:3306/test?user=root&password=swordfish").unwrap();
        assert_eq!(dsn.scheme(), "mysql");
        assert_eq!(dsn.host(), Some("localhost"));
        assert_eq!(dsn.port(), Some(3306));
        assert_eq!(dsn.database(), "test");
        assert_eq!(dsn.param("user"), Some("root"));
        assert_eq!(dsn.param("password"), Some("swordfish"));
        assert!(!dsn.is_file_backed());
    }

    #[test]
    fn test_sqlite_relative_path_and_memory() {
        let dsn = Dsn::parse("sqlite://engine.db3?foreign_keys=on").unwrap();
        assert_eq!(dsn.database(), "engine.db3");

        let dsn = Dsn::parse("sqlite://:memory:").unwrap();
        assert_eq!(dsn.database(), ":memory:");
        assert_eq!(dsn.param_count(), 0);
    }

    #[test]
    fn test_empty_host_means_path_for_any_scheme() {
        let dsn = Dsn::parse("oracle:///servicename?user=scott").unwrap();
        assert!(dsn.is_file_backed());
        assert_eq!(dsn.database(), "/servicename");
    }

    #[test]
    fn test_scheme_is_lowercased() {
        let dsn = Dsn::parse("  MySQL://db:3306/app").unwrap();
        assert_eq!(dsn.scheme(), "mysql");
    }

    #[test]
    fn test_missing_fields_are_named() {
        assert_eq!(field_of(Dsn::parse("").unwrap_err()), "scheme");
        assert_eq!(field_of(Dsn::parse("localhost:3306").unwrap_err()), "scheme");
        assert_eq!(field_of(Dsn::parse("://localhost:1/x").unwrap_err()), "scheme");
        assert_eq!(field_of(Dsn::parse("mysql://:3306/test").unwrap_err()), "host");
        assert_eq!(field_of(Dsn::parse("mysql://localhost/test").unwrap_err()), "port");
        assert_eq!(field_of(Dsn::parse("mysql://localhost:/test").unwrap_err()), "port");
        assert_eq!(field_of(Dsn::parse("mysql://localhost:99999/test").unwrap_err()), "port");
        assert_eq!(field_of(Dsn::parse("mysql://localhost:3306").unwrap_err()), "database");
        assert_eq!(field_of(Dsn::parse("mysql://localhost:3306/?a=b").unwrap_err()), "database");
        assert_eq!(field_of(Dsn::parse("sqlite://?a=b").unwrap_err()), "path");
        assert_eq!(field_of(Dsn::parse("mysql:///").unwrap_err()), "path");
    }

    #[test]
    fn test_params_last_wins_and_verbatim() {
        let dsn = Dsn::parse("pg://h:5432/d?a=1&a=2&b=x%20y").unwrap();
        assert_eq!(dsn.param("a"), Some("2"));
        assert_eq!(dsn.param("b"), Some("x%20y"));
    }

    #[test]
    fn test_malformed_params_are_skipped() {
        let dsn = Dsn::parse("sqlite:///a.db?&flag&=v&k=&ok=1&").unwrap();
        assert_eq!(dsn.param_count(), 1);
        assert_eq!(dsn.param("ok"), Some("1"));
    }

    #[test]
    fn test_display_redacts_password() {
        let dsn =
            Dsn::parse("mysql://localhost:3306/test?user=root&password=swordfish").unwrap();
        let shown = dsn.to_string();
        assert_eq!(shown, "mysql://localhost:3306/test?password=***&user=root");
        assert!(!format!("{dsn:?}").contains("swordfish"));
    }

    #[test]
    fn test_from_str() {
        let dsn: Dsn = "sqlite:///var/db/app.db".parse().unwrap();
        assert_eq!(dsn.database(), "/var/db/app.db");
    }
}
