use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::identity::canonical_address;
use crate::reputation::DEFAULT_COMPLETION_POINTS;

/// Service configuration, loaded from `BOUNTY_*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Content store configuration
    pub content: ContentConfig,
    /// Reputation ledger configuration
    pub ledger: LedgerConfig,
    /// Dispute arbitration
    pub dispute: DisputeConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Rate limit per minute per IP
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
    /// Enable CORS
    pub enable_cors: bool,
    /// Key required by administrative endpoints; empty disables them
    #[serde(skip_serializing)]
    pub admin_api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string
    #[serde(skip_serializing)]
    pub postgres_url: String,
    /// Enable PostgreSQL (if false, uses the in-memory store)
    pub postgres_enabled: bool,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Use IPFS (if false, content is kept in memory)
    pub ipfs_enabled: bool,
    pub ipfs_endpoint: String,
    pub ipfs_project_id: Option<String>,
    #[serde(skip_serializing)]
    pub ipfs_project_secret: Option<String>,
    pub timeout_secs: u64,
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Points credited to the hunter per completed bounty
    pub completion_points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeConfig {
    /// Wallet allowed to resolve disputes
    pub arbiter_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Enable request/response logging
    pub log_requests: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            postgres_url: "postgresql://localhost:5432/bounty_ledger".to_string(),
            postgres_enabled: false,
            max_connections: 10,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            ipfs_enabled: false,
            ipfs_endpoint: "https://ipfs.infura.io:5001/api/v0".to_string(),
            ipfs_project_id: None,
            ipfs_project_secret: None,
            timeout_secs: 30,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            security: SecurityConfig {
                rate_limit_per_minute: 120,
                max_request_size: 1024 * 1024, // 1MB
                enable_cors: false,
                admin_api_key: String::new(),
            },
            database: DatabaseConfig::default(),
            content: ContentConfig::default(),
            ledger: LedgerConfig {
                completion_points: DEFAULT_COMPLETION_POINTS,
            },
            dispute: DisputeConfig {
                arbiter_address: String::new(), // MUST be configured
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_requests: false,
            },
        }
    }
}

fn parse_var<T>(name: &str, value: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|v| v.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("Invalid {name} value"))
}

impl AppConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Server configuration
        if let Some(host) = lookup("BOUNTY_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_var("BOUNTY_PORT", lookup("BOUNTY_PORT"))? {
            config.server.port = port;
        }

        // Database configuration
        if let Some(url) = lookup("BOUNTY_POSTGRES_URL") {
            config.database.postgres_url = url;
        }
        if let Some(enabled) =
            parse_var("BOUNTY_POSTGRES_ENABLED", lookup("BOUNTY_POSTGRES_ENABLED"))?
        {
            config.database.postgres_enabled = enabled;
        }
        if let Some(max) = parse_var(
            "BOUNTY_POSTGRES_MAX_CONNECTIONS",
            lookup("BOUNTY_POSTGRES_MAX_CONNECTIONS"),
        )? {
            config.database.max_connections = max;
        }

        // Ledger configuration
        if let Some(points) =
            parse_var("BOUNTY_COMPLETION_POINTS", lookup("BOUNTY_COMPLETION_POINTS"))?
        {
            config.ledger.completion_points = points;
        }

        // Dispute configuration
        config.dispute.arbiter_address = lookup("BOUNTY_ARBITER_ADDRESS")
            .context("BOUNTY_ARBITER_ADDRESS environment variable is required")?;

        // Content configuration
        if let Some(enabled) = parse_var("BOUNTY_IPFS_ENABLED", lookup("BOUNTY_IPFS_ENABLED"))? {
            config.content.ipfs_enabled = enabled;
        }
        if let Some(endpoint) = lookup("BOUNTY_IPFS_ENDPOINT") {
            config.content.ipfs_endpoint = endpoint;
        }
        config.content.ipfs_project_id = lookup("BOUNTY_IPFS_PROJECT_ID").filter(|v| !v.is_empty());
        config.content.ipfs_project_secret =
            lookup("BOUNTY_IPFS_PROJECT_SECRET").filter(|v| !v.is_empty());
        if let Some(secs) =
            parse_var("BOUNTY_IPFS_TIMEOUT_SECS", lookup("BOUNTY_IPFS_TIMEOUT_SECS"))?
        {
            config.content.timeout_secs = secs;
        }

        // Security configuration
        if let Some(limit) = parse_var(
            "BOUNTY_RATE_LIMIT_PER_MINUTE",
            lookup("BOUNTY_RATE_LIMIT_PER_MINUTE"),
        )? {
            config.security.rate_limit_per_minute = limit;
        }
        if let Some(size) =
            parse_var("BOUNTY_MAX_REQUEST_SIZE", lookup("BOUNTY_MAX_REQUEST_SIZE"))?
        {
            config.security.max_request_size = size;
        }
        if let Some(cors) = parse_var("BOUNTY_ENABLE_CORS", lookup("BOUNTY_ENABLE_CORS"))? {
            config.security.enable_cors = cors;
        }
        match lookup("BOUNTY_ADMIN_API_KEY") {
            Some(key) => config.security.admin_api_key = key,
            None => warn!("BOUNTY_ADMIN_API_KEY not set, admin endpoints are disabled"),
        }

        // Logging configuration
        if let Some(level) = lookup("BOUNTY_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(log_requests) =
            parse_var("BOUNTY_LOG_REQUESTS", lookup("BOUNTY_LOG_REQUESTS"))?
        {
            config.logging.log_requests = log_requests;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for consistency. Canonicalizes the arbiter
    /// address in place.
    pub fn validate(&mut self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.ledger.completion_points <= 0 {
            return Err(anyhow::anyhow!(
                "Completion points must be positive, got {}",
                self.ledger.completion_points
            ));
        }

        self.dispute.arbiter_address = canonical_address(&self.dispute.arbiter_address)
            .context("BOUNTY_ARBITER_ADDRESS is not a valid wallet address")?;

        if self.content.ipfs_enabled && self.content.ipfs_endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "IPFS is enabled but BOUNTY_IPFS_ENDPOINT is empty"
            ));
        }

        if self.database.postgres_enabled && self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("PostgreSQL pool needs at least one connection"));
        }

        if !self.security.admin_api_key.is_empty() && self.security.admin_api_key.len() < 32 {
            return Err(anyhow::anyhow!(
                "Admin API key is too short (minimum 32 characters for security)"
            ));
        }

        Ok(())
    }
}

/// Sanitize sensitive data for logging
pub fn sanitize_for_logging(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    let keep = if chars.len() > 20 { 6 } else { 2 };
    let head: String = chars.iter().take(keep).collect();
    let tail: String = chars[chars.len().saturating_sub(keep)..].iter().collect();
    format!("{head}***{tail}")
}
