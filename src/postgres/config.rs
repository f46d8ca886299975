use deadpool_postgres::Config as PgConfig;

use crate::error::SqlSessionError;

/// Connection options for a PostgreSQL engine.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub config: PgConfig,
}

impl PostgresOptions {
    #[must_use]
    pub fn new(config: PgConfig) -> Self {
        Self { config }
    }

    /// Options for a `postgres://` or `postgresql://` URL; parsing is left to the driver.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let mut config = PgConfig::new();
        config.url = Some(url.to_string());
        Self { config }
    }

    /// Check that the fields needed to connect are present.
    ///
    /// A URL carries everything itself; otherwise dbname, host, port, user and password are
    /// all required.
    ///
    /// # Errors
    /// Returns `ConfigError` naming the first missing field.
    pub fn validate(&self) -> Result<(), SqlSessionError> {
        if self.config.url.is_some() {
            return Ok(());
        }
        let cfg = &self.config;
        let required = [
            ("dbname", cfg.dbname.is_some()),
            ("host", cfg.host.is_some()),
            ("port", cfg.port.is_some()),
            ("user", cfg.user.is_some()),
            ("password", cfg.password.is_some()),
        ];
        match required.iter().find(|(_, present)| !present) {
            Some((field, _)) => Err(SqlSessionError::ConfigError(format!(
                "{field} is required"
            ))),
            None => Ok(()),
        }
    }

    /// URL shown for the connection, password redacted.
    #[must_use]
    pub fn display_url(&self) -> String {
        if let Some(url) = &self.config.url {
            return crate::registry::redact_url(url);
        }
        let cfg = &self.config;
        format!(
            "postgresql://{}:***@{}:{}/{}",
            cfg.user.as_deref().unwrap_or_default(),
            cfg.host.as_deref().unwrap_or_default(),
            cfg.port.unwrap_or(5432),
            cfg.dbname.as_deref().unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_named() {
        let mut cfg = PgConfig::new();
        cfg.dbname = Some("app".into());
        cfg.host = Some("localhost".into());
        let err = PostgresOptions::new(cfg).validate().unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: port is required");
    }

    #[test]
    fn urls_are_redacted_for_display() {
        let options = PostgresOptions::from_url("postgresql://ann:pw@db/app");
        assert!(options.validate().is_ok());
        assert_eq!(options.display_url(), "postgresql://ann:***@db/app");
    }
}
