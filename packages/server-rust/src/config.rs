//! Server configuration, read from the command line and the environment.

use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Server-level configuration.
///
/// Controls the listening port, the backing store, rate limiting, token
/// issuance and background task intervals. Fixed once the server starts.
#[derive(Debug, Clone, Parser)]
#[command(name = "campus-server", version, about = "Campus records RPC server")]
pub struct ServerConfig {
    /// Port the transport listens on.
    #[arg(long, env = "SERVER_PORT", default_value_t = 50051)]
    pub port: u16,

    /// Document store URL. Only `memory://` is served in-process.
    #[arg(long, env = "MONGODB_URI", default_value = "memory://campus")]
    pub database_url: String,

    /// Database holding the teachers, students and execs collections.
    #[arg(long, env = "DATABASE_NAME", default_value = "school")]
    pub database_name: String,

    /// Calls allowed per caller address within one reset interval.
    #[arg(long, env = "RATE_LIMIT", default_value_t = 5)]
    pub rate_limit: u32,

    /// Seconds between rate-limit counter resets.
    #[arg(long, env = "RATE_LIMIT_RESET_SECS", default_value_t = 60)]
    pub rate_limit_reset_secs: u64,

    /// HMAC secret for session tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Lifetime of issued session tokens in seconds.
    #[arg(long, env = "JWT_EXPIRES_IN_SECS", default_value_t = 900)]
    pub jwt_ttl_secs: u64,

    /// Seconds between sweeps of expired revoked tokens.
    #[arg(long, env = "REVOCATION_SWEEP_SECS", default_value_t = 60)]
    pub revocation_sweep_secs: u64,

    /// Timeout applied to calls that arrive without a deadline, in milliseconds.
    #[arg(long, env = "CALL_TIMEOUT_MS", default_value_t = 30_000)]
    pub call_timeout_ms: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    #[must_use]
    pub fn rate_limit_reset_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_reset_secs)
    }

    #[must_use]
    pub fn jwt_ttl(&self) -> Duration {
        Duration::from_secs(self.jwt_ttl_secs)
    }

    #[must_use]
    pub fn revocation_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.revocation_sweep_secs)
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 50051,
            database_url: "memory://campus".to_string(),
            database_name: "school".to_string(),
            rate_limit: 5,
            rate_limit_reset_secs: 60,
            jwt_secret: "campus-dev-secret".to_string(),
            jwt_ttl_secs: 900,
            revocation_sweep_secs: 60,
            call_timeout_ms: 30_000,
            log_format: LogFormat::Pretty,
        }
    }
}
