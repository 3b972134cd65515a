//! Configuration management for Gatehouse.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GatehouseError, Result};
use crate::http::RouteClassifier;
use crate::ratelimit::{
    LimitSettings, DEFAULT_ADMIN_MAX_REQUESTS, DEFAULT_PUBLIC_MAX_REQUESTS,
    DEFAULT_STALE_AFTER_WINDOWS, DEFAULT_WINDOW,
};

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "GATEHOUSE";
/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

/// Main configuration for the Gatehouse service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatehouseConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Path prefix of routes that get the admin budget
    #[serde(default = "default_admin_path_prefix")]
    pub admin_path_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            admin_path_prefix: default_admin_path_prefix(),
        }
    }
}

impl ServerConfig {
    /// Build the route classifier for the configured admin prefix.
    pub fn route_classifier(&self) -> RouteClassifier {
        RouteClassifier::new(self.admin_path_prefix.as_str())
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_admin_path_prefix() -> String {
    "/api/admin".to_string()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum requests per window on public routes
    #[serde(default = "default_public_max_requests")]
    pub public_max_requests: u64,

    /// Maximum requests per window on admin routes
    #[serde(default = "default_admin_max_requests")]
    pub admin_max_requests: u64,

    /// Sweep interval in milliseconds; defaults to the window length
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,

    /// Entries idle for more than this many windows are evicted
    #[serde(default = "default_stale_after_windows")]
    pub stale_after_windows: u32,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            public_max_requests: default_public_max_requests(),
            admin_max_requests: default_admin_max_requests(),
            sweep_interval_ms: None,
            stale_after_windows: default_stale_after_windows(),
        }
    }
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW.as_millis() as u64
}

fn default_public_max_requests() -> u64 {
    DEFAULT_PUBLIC_MAX_REQUESTS
}

fn default_admin_max_requests() -> u64 {
    DEFAULT_ADMIN_MAX_REQUESTS
}

fn default_stale_after_windows() -> u32 {
    DEFAULT_STALE_AFTER_WINDOWS
}

impl RateLimitingConfig {
    /// Window length as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// How often the sweeper runs.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.unwrap_or(self.window_ms))
    }

    /// Age past which idle entries are evicted, `None` on overflow.
    pub fn stale_after(&self) -> Option<Duration> {
        self.window().checked_mul(self.stale_after_windows)
    }

    /// Build the limiter settings described by this section.
    pub fn limit_settings(&self) -> LimitSettings {
        LimitSettings {
            window: self.window(),
            public_max_requests: self.public_max_requests,
            admin_max_requests: self.admin_max_requests,
            stale_after: self.stale_after().unwrap_or(Duration::MAX),
        }
    }
}

impl GatehouseConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration file");

        let contents = std::fs::read_to_string(path)?;
        let config: GatehouseConfig = serde_yaml::from_str(&contents)
            .map_err(|e| GatehouseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults, an optional YAML file, and the
    /// environment, in increasing order of precedence.
    ///
    /// Environment keys look like `GATEHOUSE__RATE_LIMITING__WINDOW_MS`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(
        path: Option<&Path>,
        env: Option<::config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let config: GatehouseConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the limiter cannot run with.
    pub fn validate(&self) -> Result<()> {
        let rl = &self.rate_limiting;
        if rl.window_ms == 0 {
            return Err(GatehouseError::Config(
                "rate_limiting.window_ms must be greater than zero".to_string(),
            ));
        }
        if rl.public_max_requests == 0 || rl.admin_max_requests == 0 {
            return Err(GatehouseError::Config(
                "request thresholds must be greater than zero".to_string(),
            ));
        }
        if rl.sweep_interval_ms == Some(0) {
            return Err(GatehouseError::Config(
                "rate_limiting.sweep_interval_ms must be greater than zero".to_string(),
            ));
        }
        if rl.stale_after_windows == 0 {
            return Err(GatehouseError::Config(
                "rate_limiting.stale_after_windows must be greater than zero".to_string(),
            ));
        }
        if rl.stale_after().is_none() {
            return Err(GatehouseError::Config(format!(
                "rate_limiting.stale_after_windows ({}) times window_ms ({}) overflows",
                rl.stale_after_windows, rl.window_ms
            )));
        }
        if !self.server.admin_path_prefix.starts_with('/') {
            return Err(GatehouseError::Config(format!(
                "server.admin_path_prefix must start with '/', got {:?}",
                self.server.admin_path_prefix
            )));
        }
        Ok(())
    }
}
