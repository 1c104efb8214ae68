//! Configuration for SingleStore MCP Server
//!
//! Connection settings come from the environment and are validated once at
//! startup, before the transport is served.

use crate::error::{SingleStoreError, SingleStoreResult};
use sqlx::mysql::MySqlConnectOptions;
use std::fmt;

/// Default SingleStore (MySQL protocol) port
pub const DEFAULT_PORT: u16 = 3306;

pub const ENV_HOST: &str = "SINGLESTORE_HOST";
pub const ENV_PORT: &str = "SINGLESTORE_PORT";
pub const ENV_USER: &str = "SINGLESTORE_USER";
pub const ENV_PASSWORD: &str = "SINGLESTORE_PASSWORD";
pub const ENV_DATABASE: &str = "SINGLESTORE_DATABASE";

/// SingleStore connection configuration
#[derive(Clone)]
pub struct SingleStoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    password: String,
    pub database: String,
}

impl SingleStoreConfig {
    /// Load configuration from the process environment
    ///
    /// Reads `SINGLESTORE_HOST`, `SINGLESTORE_PORT` (default 3306),
    /// `SINGLESTORE_USER`, `SINGLESTORE_PASSWORD` and `SINGLESTORE_DATABASE`.
    pub fn from_env() -> SingleStoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> SingleStoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> SingleStoreResult<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                Some(_) => Err(SingleStoreError::Configuration(format!("{} is set but empty", name))),
                None => Err(SingleStoreError::Configuration(format!("{} is not set", name))),
            }
        };

        let host = required(ENV_HOST)?;
        let user = required(ENV_USER)?;
        let database = required(ENV_DATABASE)?;

        // An empty password is legitimate for local development users,
        // but the variable itself has to be present.
        let password = lookup(ENV_PASSWORD).ok_or_else(|| {
            SingleStoreError::Configuration(format!("{} is not set", ENV_PASSWORD))
        })?;

        let port = match lookup(ENV_PORT) {
            None => DEFAULT_PORT,
            Some(raw) if raw.trim().is_empty() => DEFAULT_PORT,
            Some(raw) => parse_port(&raw)?,
        };

        Ok(Self {
            host,
            port,
            user,
            password,
            database,
        })
    }

    /// Driver connect options for this configuration
    ///
    /// The session lives for the whole process and runs arbitrary SQL, so
    /// the client-side statement cache is off: cached metadata would outlive
    /// schema changes and every distinct statement would pin a server-side
    /// handle.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .statement_cache_capacity(0)
    }
}

fn parse_port(raw: &str) -> SingleStoreResult<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(SingleStoreError::Configuration(format!(
            "{} must be a port number between 1 and 65535, got '{}'",
            ENV_PORT, raw
        ))),
        Ok(port) => Ok(port),
    }
}

impl fmt::Debug for SingleStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_HOST, "svc-123.singlestore.com"),
            (ENV_USER, "admin"),
            (ENV_PASSWORD, "hunter2"),
            (ENV_DATABASE, "analytics"),
        ]
    }

    #[test]
    fn test_defaults_port() {
        let config = SingleStoreConfig::from_lookup(lookup_from(&full_env())).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, "svc-123.singlestore.com");
        assert_eq!(config.database, "analytics");
    }

    #[test]
    fn test_explicit_port() {
        let mut env = full_env();
        env.push((ENV_PORT, "3333"));
        let config = SingleStoreConfig::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(config.port, 3333);
    }

    #[test]
    fn test_invalid_port() {
        for bad in ["abc", "0", "70000"] {
            let mut env = full_env();
            env.push((ENV_PORT, bad));
            let err = SingleStoreConfig::from_lookup(lookup_from(&env)).unwrap_err();
            assert!(matches!(err, SingleStoreError::Configuration(_)), "port {}", bad);
        }
    }

    #[test]
    fn test_missing_host_names_variable() {
        let env: Vec<_> = full_env().into_iter().filter(|(k, _)| *k != ENV_HOST).collect();
        let err = SingleStoreConfig::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(err.to_string().contains(ENV_HOST));
    }

    #[test]
    fn test_blank_database_rejected() {
        let mut env: Vec<_> = full_env().into_iter().filter(|(k, _)| *k != ENV_DATABASE).collect();
        env.push((ENV_DATABASE, "   "));
        let err = SingleStoreConfig::from_lookup(lookup_from(&env)).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_empty_password_allowed_but_required() {
        let mut env: Vec<_> = full_env().into_iter().filter(|(k, _)| *k != ENV_PASSWORD).collect();
        assert!(SingleStoreConfig::from_lookup(lookup_from(&env)).is_err());

        env.push((ENV_PASSWORD, ""));
        assert!(SingleStoreConfig::from_lookup(lookup_from(&env)).is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SingleStoreConfig::from_lookup(lookup_from(&full_env())).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
