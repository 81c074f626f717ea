//! Scheme-to-driver lookup.
//!
//! The pool never names a concrete backend. It resolves the DSN scheme to a
//! constructor through a [`DriverRegistry`], so adding a backend means
//! registering a constructor, not touching pool code.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sqlpool_driver::{Connect, Driver, DriverError, DriverOptions, Dsn};

use crate::error::PoolError;

/// Opens one physical connection for a DSN.
pub type DriverConstructor =
    Arc<dyn Fn(&Dsn, &DriverOptions) -> Result<Box<dyn Driver>, DriverError> + Send + Sync>;

/// Maps DSN schemes to driver constructors.
///
/// Scheme lookup is case-insensitive. Registering a scheme twice replaces the
/// earlier constructor.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    constructors: HashMap<String, DriverConstructor>,
}

impl DriverRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every backend compiled into this build.
    #[must_use]
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register_driver::<sqlpool_sqlite::SqliteDriver>(sqlpool_sqlite::SCHEME);
        registry
    }

    /// Register a constructor closure for `scheme`.
    pub fn register<F>(&mut self, scheme: &str, constructor: F) -> &mut Self
    where
        F: Fn(&Dsn, &DriverOptions) -> Result<Box<dyn Driver>, DriverError> + Send + Sync + 'static,
    {
        let scheme = scheme.to_ascii_lowercase();
        if self
            .constructors
            .insert(scheme.clone(), Arc::new(constructor))
            .is_some()
        {
            tracing::debug!(scheme = %scheme, "replaced registered driver");
        }
        self
    }

    /// Register a backend type implementing [`Connect`] for `scheme`.
    pub fn register_driver<D: Connect>(&mut self, scheme: &str) -> &mut Self {
        self.register(scheme, |dsn, options| {
            let driver: Box<dyn Driver> = Box::new(D::open(dsn, options)?);
            Ok(driver)
        })
    }

    /// Look up the constructor for `scheme`.
    pub fn resolve(&self, scheme: &str) -> Result<DriverConstructor, PoolError> {
        self.constructors
            .get(&scheme.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| PoolError::UnsupportedBackend(scheme.to_string()))
    }

    /// Check whether a driver is registered for `scheme`.
    #[must_use]
    pub fn supports(&self, scheme: &str) -> bool {
        self.constructors
            .contains_key(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes in sorted order.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn refuse(_: &Dsn, _: &DriverOptions) -> Result<Box<dyn Driver>, DriverError> {
        Err(DriverError::Connect("refused".into()))
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let registry = DriverRegistry::new();
        assert!(!registry.supports("sqlite"));
        assert!(matches!(
            registry.resolve("sqlite"),
            Err(PoolError::UnsupportedBackend(scheme)) if scheme == "sqlite"
        ));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = DriverRegistry::new();
        registry.register("MySQL", refuse);

        assert!(registry.supports("mysql"));
        assert!(registry.supports("MYSQL"));
        assert_eq!(registry.schemes(), vec!["mysql"]);
    }

    #[test]
    fn test_resolved_constructor_is_invoked() {
        let mut registry = DriverRegistry::new();
        registry.register("fake", refuse);

        let dsn = Dsn::parse("fake://h:1/db").unwrap();
        let constructor = registry.resolve(dsn.scheme()).unwrap();
        let err = constructor(&dsn, &DriverOptions::new()).err().unwrap();
        assert!(err.is_connect());
    }

    #[test]
    fn test_schemes_sorted() {
        let mut registry = DriverRegistry::new();
        registry.register("pg", refuse).register("db2", refuse);
        assert_eq!(registry.schemes(), vec!["db2", "pg"]);
        assert!(format!("{registry:?}").contains("db2"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_defaults_include_sqlite() {
        let registry = DriverRegistry::with_defaults();
        assert!(registry.supports("sqlite"));
    }
}
