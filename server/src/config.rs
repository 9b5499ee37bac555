//! Server configuration from the environment.
//!
//! `.env` is loaded by `main` before this runs; real environment variables
//! win over the file.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CURSOR_RATE_LIMIT: usize = 60;
pub const DEFAULT_CURSOR_RATE_WINDOW_MS: u64 = 1000;
pub const DEFAULT_ROOM_CHANNEL_CAPACITY: usize = 256;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DB_ACQUIRE_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub pool: PoolConfig,
    pub relay: RelayConfig,
}

/// Sizing of the Postgres pool behind the document API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long a request waits for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_millis(DEFAULT_DB_ACQUIRE_TIMEOUT_MS),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS).max(1),
            acquire_timeout: Duration::from_millis(env_parse(
                "DB_ACQUIRE_TIMEOUT_MS",
                DEFAULT_DB_ACQUIRE_TIMEOUT_MS,
            )),
        }
    }
}

/// Limits applied by the websocket relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Cursor frames allowed per connection per window.
    pub cursor_rate_limit: usize,
    pub cursor_rate_window: Duration,
    /// Outbound frames queued per connection before drops.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cursor_rate_limit: DEFAULT_CURSOR_RATE_LIMIT,
            cursor_rate_window: Duration::from_millis(DEFAULT_CURSOR_RATE_WINDOW_MS),
            channel_capacity: DEFAULT_ROOM_CHANNEL_CAPACITY,
        }
    }
}

impl RelayConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            cursor_rate_limit: env_parse("CURSOR_RATE_LIMIT", DEFAULT_CURSOR_RATE_LIMIT),
            cursor_rate_window: Duration::from_millis(env_parse(
                "CURSOR_RATE_WINDOW_MS",
                DEFAULT_CURSOR_RATE_WINDOW_MS,
            )),
            channel_capacity: env_parse("ROOM_CHANNEL_CAPACITY", DEFAULT_ROOM_CHANNEL_CAPACITY).max(1),
        }
    }
}

impl ServerConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        Ok(Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            pool: PoolConfig::from_env(),
            relay: RelayConfig::from_env(),
        })
    }
}

/// Parse `key` as `T`, falling back to `default` when unset or malformed.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_missing_returns_default() {
        let val: usize = env_parse("__SERVER_TEST_MISSING__", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn env_parse_present_valid() {
        unsafe { std::env::set_var("__SERVER_TEST_VALID__", "99") };
        let val: usize = env_parse("__SERVER_TEST_VALID__", 0);
        assert_eq!(val, 99);
        unsafe { std::env::remove_var("__SERVER_TEST_VALID__") };
    }

    #[test]
    fn env_parse_present_invalid_returns_default() {
        unsafe { std::env::set_var("__SERVER_TEST_INVALID__", "lots") };
        let val: u64 = env_parse("__SERVER_TEST_INVALID__", 7);
        assert_eq!(val, 7);
        unsafe { std::env::remove_var("__SERVER_TEST_INVALID__") };
    }

    #[test]
    fn relay_defaults_allow_sixty_cursors_per_second() {
        let relay = RelayConfig::default();
        assert_eq!(relay.cursor_rate_limit, 60);
        assert_eq!(relay.cursor_rate_window, Duration::from_secs(1));
    }

    #[test]
    fn pool_size_is_at_least_one() {
        unsafe { std::env::set_var("DB_MAX_CONNECTIONS", "0") };
        let pool = PoolConfig::from_env();
        unsafe { std::env::remove_var("DB_MAX_CONNECTIONS") };
        assert_eq!(pool.max_connections, 1);
        assert_eq!(pool.acquire_timeout, PoolConfig::default().acquire_timeout);
    }
}
