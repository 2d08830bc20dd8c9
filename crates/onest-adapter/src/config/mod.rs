use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::telemetry::LogFormat;

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

/// Top-level configuration, built once at startup and handed to constructors.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub network: NetworkConfig,
    pub staging: StagingConfig,
    pub callbacks: CallbackConfig,
    pub workers: WorkerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat { value: raw })?,
            Err(_) if environment == AppEnvironment::Production => LogFormat::Json,
            Err(_) => LogFormat::Compact,
        };

        let network = NetworkConfig {
            domain: string_var("NETWORK_DOMAIN", "onest:work-opportunities"),
            version: string_var("NETWORK_VERSION", "2.0.0"),
            bpp_id: string_var("BPP_ID", "bpp"),
            bpp_uri: string_var("BPP_URI", "http://localhost:8080"),
            bap_id: string_var("BAP_ID", "bap"),
            bap_uri: string_var("BAP_URI", "http://localhost:9090"),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
        };

        let staging = StagingConfig {
            ttl: Duration::from_secs(numeric_var("STAGE_TTL_SECONDS", 3600)?),
        };

        let callbacks = CallbackConfig {
            timeout: Duration::from_secs(numeric_var("CALLBACK_TIMEOUT_SECONDS", 30)?),
        };

        let workers = WorkerConfig {
            count: numeric_var("WORKER_COUNT", 4)? as usize,
            max_attempts: numeric_var("TASK_MAX_ATTEMPTS", 5)? as u32,
            retry_base: Duration::from_millis(numeric_var("TASK_RETRY_BASE_MILLIS", 500)?),
            retry_max: Duration::from_millis(numeric_var("TASK_RETRY_MAX_MILLIS", 30_000)?),
            poll_interval: Duration::from_millis(numeric_var("WORKER_POLL_MILLIS", 1_000)?),
            retention: Duration::from_secs(numeric_var("TASK_RETENTION_SECONDS", 3600)?),
        };

        if workers.count == 0 {
            return Err(ConfigError::InvalidNumber {
                variable: "WORKER_COUNT",
            });
        }
        if workers.max_attempts == 0 {
            return Err(ConfigError::InvalidNumber {
                variable: "TASK_MAX_ATTEMPTS",
            });
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            network,
            staging,
            callbacks,
            workers,
        })
    }
}

fn string_var(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn numeric_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { variable: name }),
        _ => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Identity of both network participants plus the values stamped on every context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub domain: String,
    pub version: String,
    pub bpp_id: String,
    pub bpp_uri: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub allowed_origins: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            domain: "onest:work-opportunities".to_string(),
            version: "2.0.0".to_string(),
            bpp_id: "bpp".to_string(),
            bpp_uri: "http://localhost:8080".to_string(),
            bap_id: "bap".to_string(),
            bap_uri: "http://localhost:9090".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Lifetime of an `init` snapshot waiting for its `confirm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingConfig {
    pub ttl: Duration,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Outbound callback client settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackConfig {
    pub timeout: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// Worker pool sizing and retry schedule for queued protocol tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub count: usize,
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
    pub poll_interval: Duration,
    /// How long completed tasks stay readable before the sweeper drops them.
    pub retention: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 4,
            max_attempts: 5,
            retry_base: Duration::from_millis(500),
            retry_max: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            retention: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a positive integer")
            }
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT must be compact or json, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidLogFormat { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
