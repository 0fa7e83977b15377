use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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

/// Top-level configuration for the portal.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub registry: RegistryConfig,
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

        let province_code = env::var("CIVIC_PROVINCE_CODE")
            .unwrap_or_else(|_| DEFAULT_PROVINCE_CODE.to_string());
        let upload_prefix = env::var("CIVIC_UPLOAD_PREFIX")
            .unwrap_or_else(|_| DEFAULT_UPLOAD_PREFIX.to_string());
        let citizen_id_attempts = env::var("CIVIC_CITIZEN_ID_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_CITIZEN_ID_ATTEMPTS.to_string())
            .parse::<u8>()
            .ok()
            .filter(|attempts| *attempts > 0)
            .ok_or(ConfigError::InvalidCitizenIdAttempts)?;

        let registry = RegistryConfig::new(province_code, upload_prefix, citizen_id_attempts)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            registry,
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

const DEFAULT_PROVINCE_CODE: &str = "001";
const DEFAULT_UPLOAD_PREFIX: &str = "/uploads";
const DEFAULT_CITIZEN_ID_ATTEMPTS: u8 = 8;

/// Registry office settings used by submission and record derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Three digit province code prefixed to generated newborn citizen ids.
    pub province_code: String,
    /// Path prefix under which attachment blobs are addressed.
    pub upload_prefix: String,
    /// Draws of the random newborn id suffix before derivation gives up.
    pub citizen_id_attempts: u8,
}

impl RegistryConfig {
    pub fn new(
        province_code: impl Into<String>,
        upload_prefix: impl Into<String>,
        citizen_id_attempts: u8,
    ) -> Result<Self, ConfigError> {
        let province_code = province_code.into().trim().to_string();
        if province_code.len() != 3 || !province_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidProvinceCode(province_code));
        }
        if citizen_id_attempts == 0 {
            return Err(ConfigError::InvalidCitizenIdAttempts);
        }

        let upload_prefix = upload_prefix.into().trim_end_matches('/').to_string();

        Ok(Self {
            province_code,
            upload_prefix,
            citizen_id_attempts,
        })
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            province_code: DEFAULT_PROVINCE_CODE.to_string(),
            upload_prefix: DEFAULT_UPLOAD_PREFIX.to_string(),
            citizen_id_attempts: DEFAULT_CITIZEN_ID_ATTEMPTS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidProvinceCode(String),
    InvalidCitizenIdAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidProvinceCode(value) => {
                write!(f, "CIVIC_PROVINCE_CODE must be three digits, got '{value}'")
            }
            ConfigError::InvalidCitizenIdAttempts => {
                write!(f, "CIVIC_CITIZEN_ID_ATTEMPTS must be an integer between 1 and 255")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidProvinceCode(_)
            | ConfigError::InvalidCitizenIdAttempts => None,
        }
    }
}
