//! Configuration module for vanwatt.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 5000)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "vanwatt.db")
    pub db_path: String,
    /// Dashboard pin; unset or empty leaves the gate disabled
    pub dashboard_pin: Option<String>,
    /// Days of history to keep; unset keeps everything forever
    pub retention_days: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 5000,
            db_path: "vanwatt.db".to_string(),
            dashboard_pin: None,
            retention_days: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VANWATT_HTTP_PORT`: HTTP port (default: 5000)
    /// - `VANWATT_DB_PATH`: Database file path (default: "vanwatt.db")
    /// - `VANWATT_PIN`: Dashboard pin (unset or empty disables the gate)
    /// - `VANWATT_RETENTION_DAYS`: Prune readings older than this (unset keeps all)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("VANWATT_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("VANWATT_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(pin) = env::var("VANWATT_PIN") {
            cfg.dashboard_pin = Some(pin);
        }

        if let Ok(days_str) = env::var("VANWATT_RETENTION_DAYS") {
            if let Ok(days) = days_str.parse() {
                cfg.retention_days = Some(days);
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 5000);
        assert_eq!(cfg.db_path, "vanwatt.db");
        assert_eq!(cfg.dashboard_pin, None);
        assert_eq!(cfg.retention_days, None);
    }
}
