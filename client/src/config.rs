//! Client configuration from the environment.
//!
//! Every setting has a default so a bare environment talks to a server on
//! `localhost:3000`.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:3000/api/ws";
pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_IDENTITY_PATH: &str = ".sketchsync/identity.json";
pub const DEFAULT_CANVAS_WIDTH: u32 = 1920;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Websocket endpoint of the relay.
    pub relay_url: String,
    /// Base URL of the document store API.
    pub api_url: String,
    pub autosave_debounce: Duration,
    pub identity_path: PathBuf,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            api_url: DEFAULT_API_URL.to_owned(),
            autosave_debounce: Duration::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS),
            identity_path: PathBuf::from(DEFAULT_IDENTITY_PATH),
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            relay_url: env_string("SKETCHSYNC_RELAY_URL", DEFAULT_RELAY_URL),
            api_url: env_string("SKETCHSYNC_API_URL", DEFAULT_API_URL),
            autosave_debounce: Duration::from_millis(env_parse(
                "SKETCHSYNC_AUTOSAVE_DEBOUNCE_MS",
                DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            )),
            identity_path: PathBuf::from(env_string("SKETCHSYNC_IDENTITY_PATH", DEFAULT_IDENTITY_PATH)),
            canvas_width: env_parse("SKETCHSYNC_CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH).max(1),
            canvas_height: env_parse("SKETCHSYNC_CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT).max(1),
        }
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

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}
