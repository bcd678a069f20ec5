//! Environment-driven configuration
//!
//! Every key has a default; a missing or malformed value is logged and the
//! default is used instead, so the server always starts.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub admin_username: String,
    /// `None` disables admin login entirely.
    pub admin_password: Option<String>,
    pub admin_token_ttl: Duration,
    pub vote_salt: String,
    pub voting_session: Duration,
    pub matchups_per_day: usize,
    pub trust_forwarded_for: bool,
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_path: "saintfest.db".to_string(),
            admin_username: "admin".to_string(),
            admin_password: None,
            admin_token_ttl: Duration::from_secs(720 * 60),
            vote_salt: String::new(),
            voting_session: Duration::from_secs(24 * 3600),
            matchups_per_day: 2,
            trust_forwarded_for: false,
            cache_ttl: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|p| !p.is_empty());
        if admin_password.is_none() {
            warn!("ADMIN_PASSWORD not set, admin login is disabled");
        }

        let vote_salt = env::var("VOTE_SALT").unwrap_or_default();
        if vote_salt.is_empty() {
            warn!("VOTE_SALT not set, vote fingerprints are unsalted");
        }

        let token_minutes: u64 = try_load("ADMIN_TOKEN_TTL_MINUTES", 720);
        let session_hours: u64 = try_load("VOTING_SESSION_HOURS", 24);
        let cache_seconds: u64 = try_load("CACHE_TTL_SECONDS", 60);

        Self {
            port: try_load("PORT", defaults.port),
            database_path: try_load("DATABASE_PATH", defaults.database_path),
            admin_username: try_load("ADMIN_USERNAME", defaults.admin_username),
            admin_password,
            admin_token_ttl: Duration::from_secs(token_minutes.max(1) * 60),
            vote_salt,
            voting_session: Duration::from_secs(session_hours.max(1) * 3600),
            matchups_per_day: try_load::<usize>("MATCHUPS_PER_DAY", defaults.matchups_per_day).max(1),
            trust_forwarded_for: try_load("TRUST_FORWARDED_FOR", defaults.trust_forwarded_for),
            cache_ttl: Duration::from_secs(cache_seconds),
        }
    }

    pub fn log_summary(&self) {
        info!("Configuration:");
        info!("  PORT: {}", self.port);
        info!("  DATABASE_PATH: {}", self.database_path);
        info!("  ADMIN_USERNAME: {}", self.admin_username);
        info!("  ADMIN_LOGIN: {}", if self.admin_password.is_some() { "enabled" } else { "disabled" });
        info!("  VOTING_SESSION: {:?}", self.voting_session);
        info!("  MATCHUPS_PER_DAY: {}", self.matchups_per_day);
        info!("  TRUST_FORWARDED_FOR: {}", self.trust_forwarded_for);
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?} ({e}), using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.matchups_per_day, 2);
        assert!(config.admin_password.is_none());
        assert_eq!(config.voting_session, Duration::from_secs(86_400));
    }

    #[test]
    fn test_try_load_falls_back_on_garbage() {
        std::env::set_var("SAINTFEST_TEST_PORT_GARBAGE", "not-a-port");
        let port: u16 = try_load("SAINTFEST_TEST_PORT_GARBAGE", 8080);
        assert_eq!(port, 8080);

        std::env::set_var("SAINTFEST_TEST_PORT_OK", " 4100 ");
        let port: u16 = try_load("SAINTFEST_TEST_PORT_OK", 8080);
        assert_eq!(port, 4100);
    }
}
