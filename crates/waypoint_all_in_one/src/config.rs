use anyhow::Context;
use common::domain::{DomainError, DomainResult};
use common::postgres::PostgresConfig;
use common::telemetry::{LogFormat, TelemetryConfig};
use config::{Config, ConfigError, Environment};
use ingest_worker::{parse_broker_url, LocationSubscriberConfig};
use serde::{Deserialize, Serialize};
use tracks_api::HttpServerConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Console log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,

    // OpenTelemetry configuration
    #[serde(default)]
    pub otel_enabled: bool,

    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    // MQTT configuration
    /// Broker address: mqtt://host:port, tcp://host:port or host[:port]
    #[serde(default = "default_mqtt_broker_url")]
    pub mqtt_broker_url: String,

    #[serde(default)]
    pub mqtt_username: Option<String>,

    #[serde(default)]
    pub mqtt_password: Option<String>,

    /// Stable client id the broker keys the persistent session on
    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    #[serde(default = "default_mqtt_topic_filter")]
    pub mqtt_topic_filter: String,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// How long the broker keeps our session while we are disconnected
    #[serde(default = "default_mqtt_session_expiry_secs")]
    pub mqtt_session_expiry_secs: u32,

    #[serde(default = "default_mqtt_reconnect_delay_ms")]
    pub mqtt_reconnect_delay_ms: u64,

    #[serde(default = "default_mqtt_max_reconnect_delay_ms")]
    pub mqtt_max_reconnect_delay_ms: u64,

    #[serde(default = "default_mqtt_request_capacity")]
    pub mqtt_request_capacity: usize,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    /// Path to PostgreSQL migrations directory
    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    /// Path to goose binary
    #[serde(default = "default_postgres_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // HTTP configuration
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Upper bound on each shutdown phase in seconds
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("WAYPOINT"))
            .build()?
            .try_deserialize()
    }

    /// Reads an optional `.env` file, then the environment, then validates.
    pub fn load() -> anyhow::Result<Self> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to read .env file"),
        }

        let config = Self::from_env().context("failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        let invalid = |msg: &str| Err(DomainError::InvalidConfiguration(msg.to_string()));

        if self.mqtt_client_id.trim().is_empty() {
            return invalid("mqtt_client_id must not be empty");
        }
        if self.mqtt_topic_filter.trim().is_empty() {
            return invalid("mqtt_topic_filter must not be empty");
        }
        if self.mqtt_keep_alive_secs == 0 {
            return invalid("mqtt_keep_alive_secs must be greater than zero");
        }
        if self.mqtt_session_expiry_secs == 0 {
            return invalid("mqtt_session_expiry_secs must be greater than zero");
        }
        if self.mqtt_request_capacity == 0 {
            return invalid("mqtt_request_capacity must be greater than zero");
        }
        if self.mqtt_reconnect_delay_ms > self.mqtt_max_reconnect_delay_ms {
            return invalid("mqtt_reconnect_delay_ms must not exceed mqtt_max_reconnect_delay_ms");
        }
        if self.mqtt_password.is_some() && self.mqtt_username.is_none() {
            return invalid("mqtt_password requires mqtt_username");
        }
        if self.postgres_max_pool_size == 0 {
            return invalid("postgres_max_pool_size must be greater than zero");
        }

        parse_broker_url(&self.mqtt_broker_url)?;

        Ok(())
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }

    pub fn subscriber_config(&self) -> LocationSubscriberConfig {
        LocationSubscriberConfig {
            broker_url: self.mqtt_broker_url.clone(),
            client_id: self.mqtt_client_id.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            topic_filter: self.mqtt_topic_filter.clone(),
            keep_alive_secs: self.mqtt_keep_alive_secs,
            session_expiry_secs: self.mqtt_session_expiry_secs,
            reconnect_delay_ms: self.mqtt_reconnect_delay_ms,
            max_reconnect_delay_ms: self.mqtt_max_reconnect_delay_ms,
            request_capacity: self.mqtt_request_capacity,
            shutdown_timeout_secs: self.shutdown_timeout_secs,
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            migrations_dir: self.postgres_migrations_dir.clone(),
            goose_binary_path: self.postgres_goose_binary_path.clone(),
        }
    }

    pub fn http_server_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.http_host.clone(),
            port: self.http_port,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "waypoint".to_string()
}

fn default_mqtt_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_mqtt_client_id() -> String {
    "waypoint-ingest".to_string()
}

fn default_mqtt_topic_filter() -> String {
    "owntracks/+/+".to_string()
}

fn default_mqtt_keep_alive_secs() -> u64 {
    20
}

fn default_mqtt_session_expiry_secs() -> u32 {
    60
}

fn default_mqtt_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_mqtt_max_reconnect_delay_ms() -> u64 {
    30_000
}

fn default_mqtt_request_capacity() -> usize {
    100
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "waypoint".to_string()
}

fn default_postgres_username() -> String {
    "waypoint".to_string()
}

fn default_postgres_password() -> String {
    "waypoint".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

fn default_postgres_migrations_dir() -> String {
    "crates/common/migrations/postgres".to_string()
}

fn default_postgres_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    1323
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-wide, so tests touching them run serially
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const KEYS: &[&str] = &[
        "WAYPOINT_LOG_LEVEL",
        "WAYPOINT_LOG_FORMAT",
        "WAYPOINT_MQTT_BROKER_URL",
        "WAYPOINT_MQTT_USERNAME",
        "WAYPOINT_MQTT_SESSION_EXPIRY_SECS",
        "WAYPOINT_HTTP_PORT",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.mqtt_broker_url, "mqtt://localhost:1883");
        assert_eq!(config.mqtt_client_id, "waypoint-ingest");
        assert_eq!(config.mqtt_topic_filter, "owntracks/+/+");
        assert_eq!(config.mqtt_session_expiry_secs, 60);
        assert_eq!(config.mqtt_username, None);
        assert_eq!(config.http_port, 1323);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("WAYPOINT_LOG_LEVEL", "debug");
        std::env::set_var("WAYPOINT_LOG_FORMAT", "pretty");
        std::env::set_var("WAYPOINT_MQTT_BROKER_URL", "tcp://broker.internal:8883");
        std::env::set_var("WAYPOINT_MQTT_USERNAME", "ingest");
        std::env::set_var("WAYPOINT_HTTP_PORT", "8080");

        let config = ServiceConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.http_port, 8080);

        let subscriber = config.subscriber_config();
        assert_eq!(subscriber.broker_url, "tcp://broker.internal:8883");
        assert_eq!(subscriber.username.as_deref(), Some("ingest"));
        assert_eq!(config.http_server_config().address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_unparsable_number_is_an_error() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("WAYPOINT_MQTT_SESSION_EXPIRY_SECS", "soon");

        let result = ServiceConfig::from_env();
        clear_env();

        assert!(result.is_err());
    }

    fn valid_config() -> ServiceConfig {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();
        ServiceConfig::from_env().unwrap()
    }

    #[test]
    fn test_validate_rejects_zero_session_expiry() {
        let config = ServiceConfig {
            mqtt_session_expiry_secs: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(DomainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_broker_url() {
        let config = ServiceConfig {
            mqtt_broker_url: "mqtt://localhost:99999".to_string(),
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(DomainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_client_id() {
        let config = ServiceConfig {
            mqtt_client_id: " ".to_string(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_reconnect_delays() {
        let config = ServiceConfig {
            mqtt_reconnect_delay_ms: 5_000,
            mqtt_max_reconnect_delay_ms: 1_000,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_password_without_username() {
        let config = ServiceConfig {
            mqtt_password: Some("secret".to_string()),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }
}
