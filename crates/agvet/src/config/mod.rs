use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::workflows::telemedicine::lifecycle::{MAX_DOCUMENTATION_DUE_HOURS, MAX_FOLLOW_UP_DUE_DAYS};
use crate::workflows::telemedicine::service::MAX_VERIFICATION_TIMEOUT_DAYS;
use crate::workflows::telemedicine::EngineConfig;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = match env::var("APP_LOG_FORMAT") {
            Ok(value) => LogFormat::parse(&value).ok_or(ConfigError::InvalidValue {
                key: "APP_LOG_FORMAT",
                value,
            })?,
            Err(_) => LogFormat::Compact,
        };

        let mut engine = EngineConfig::default();
        engine.matching.shortlist_size =
            parse_var("APP_SHORTLIST_SIZE", engine.matching.shortlist_size)?;
        engine.thresholds.response_time_multiplier = parse_var(
            "APP_RESPONSE_TIME_MULTIPLIER",
            engine.thresholds.response_time_multiplier,
        )?;
        engine.thresholds.minimum_satisfaction =
            parse_var("APP_MIN_SATISFACTION", engine.thresholds.minimum_satisfaction)?;
        engine.workflow.documentation_due_hours = parse_bounded(
            "APP_DOCUMENTATION_DUE_HOURS",
            engine.workflow.documentation_due_hours,
            1..=MAX_DOCUMENTATION_DUE_HOURS,
        )?;
        engine.workflow.follow_up_due_days = parse_bounded(
            "APP_FOLLOW_UP_DUE_DAYS",
            engine.workflow.follow_up_due_days,
            1..=MAX_FOLLOW_UP_DUE_DAYS,
        )?;
        engine.verification_timeout_days = parse_bounded(
            "APP_VERIFICATION_TIMEOUT_DAYS",
            engine.verification_timeout_days,
            1..=MAX_VERIFICATION_TIMEOUT_DAYS,
        )?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            engine,
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}

fn parse_bounded(
    key: &'static str,
    default: i64,
    bounds: RangeInclusive<i64>,
) -> Result<i64, ConfigError> {
    let value = parse_var(key, default)?;
    if bounds.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue { key, value } => {
                write!(f, "{key} has an invalid value '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
