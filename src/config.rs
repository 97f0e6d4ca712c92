//! Server configuration.
//!
//! Every setting is a command-line flag that falls back to an environment
//! variable (a `.env` file is loaded first), then to a default.

use crate::auth::DEFAULT_ISSUER;
use crate::rate_limiter::{RateLimiterConfig, DEFAULT_MAX_BUCKETS};
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "tot-api", version, about = "User-account API with per-client rate limiting")]
pub struct AppConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// HMAC secret for access tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access token lifetime (e.g. 24h, 30m, 3600)
    #[arg(long, env = "JWT_EXPIRY", default_value = "24h", value_parser = parse_duration)]
    pub jwt_expiry: Duration,

    #[arg(long, env = "JWT_ISSUER", default_value = DEFAULT_ISSUER)]
    pub jwt_issuer: String,

    /// Directory profile pictures are written to
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Prefix for public file URLs; empty serves them root-relative
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "")]
    pub public_base_url: String,

    /// Requests allowed per window on signup/login
    #[arg(long, env = "AUTH_RATE_LIMIT", default_value_t = 3)]
    pub auth_rate_limit: u32,

    #[arg(long, env = "AUTH_RATE_WINDOW", default_value = "60", value_parser = parse_duration)]
    pub auth_rate_window: Duration,

    /// Requests allowed per window on all other API routes
    #[arg(long, env = "GENERIC_RATE_LIMIT", default_value_t = 30)]
    pub generic_rate_limit: u32,

    #[arg(long, env = "GENERIC_RATE_WINDOW", default_value = "60", value_parser = parse_duration)]
    pub generic_rate_window: Duration,

    /// Maximum distinct clients tracked per limiter
    #[arg(long, env = "RATE_LIMIT_MAX_BUCKETS", default_value_t = DEFAULT_MAX_BUCKETS)]
    pub rate_limit_max_buckets: usize,

    #[arg(long, env = "RATE_LIMIT_CLEANUP_INTERVAL", default_value = "5m", value_parser = parse_duration)]
    pub rate_limit_cleanup_interval: Duration,

    #[arg(long, env = "RATE_LIMIT_BUCKET_TTL", default_value = "10m", value_parser = parse_duration)]
    pub rate_limit_bucket_ttl: Duration,

    #[arg(long, env = "RATE_LIMIT_MAX_RETRY_AFTER", default_value = "5m", value_parser = parse_duration)]
    pub rate_limit_max_retry_after: Duration,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Limiter for signup and login.
    pub fn auth_limiter_config(&self) -> RateLimiterConfig {
        self.limiter_config(self.auth_rate_limit, self.auth_rate_window)
    }

    /// Limiter for every other API route.
    pub fn generic_limiter_config(&self) -> RateLimiterConfig {
        self.limiter_config(self.generic_rate_limit, self.generic_rate_window)
    }

    fn limiter_config(&self, limit: u32, window: Duration) -> RateLimiterConfig {
        RateLimiterConfig::per_window(limit, window)
            .with_max_buckets(self.rate_limit_max_buckets)
            .with_cleanup(self.rate_limit_cleanup_interval, self.rate_limit_bucket_ttl)
            .with_max_retry_after(self.rate_limit_max_retry_after)
    }
}

/// Parses `90`, `45s`, `30m`, `24h` or `7d`. A bare number is seconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let amount: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration `{value}`"))?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => return Err(format!("unknown duration unit `{other}` in `{value}`")),
    };

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration `{value}` is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppConfig {
        let mut argv = vec!["tot-api", "--jwt-secret", "s3cret"];
        argv.extend_from_slice(args);
        AppConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("24h"), Ok(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("7d"), Ok(Duration::from_secs(604_800)));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("10w").is_err());
        assert!(parse_duration("1.5h").is_err());
    }

    #[test]
    fn test_limiter_configs_from_flags() {
        let config = parse(&[
            "--auth-rate-limit",
            "6",
            "--auth-rate-window",
            "2m",
            "--rate-limit-max-buckets",
            "500",
        ]);

        let auth = config.auth_limiter_config();
        assert_eq!(auth.capacity, 6);
        assert!((auth.rate - 0.05).abs() < 1e-12);
        assert_eq!(auth.max_buckets, 500);
        assert!(auth.validate().is_ok());

        let generic = config.generic_limiter_config();
        assert_eq!(generic.capacity, 30);
        assert!((generic.rate - 0.5).abs() < 1e-12);
        assert_eq!(generic.bucket_ttl, Duration::from_secs(600));
    }

    #[test]
    fn test_socket_addr_and_log_format() {
        let config = parse(&["--port", "9000", "--host", "127.0.0.1", "--log-format", "json"]);
        assert_eq!(config.socket_addr(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.jwt_expiry, Duration::from_secs(86_400));
    }
}
