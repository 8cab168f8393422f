//! Configuration module for the Yatube backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Deployment-wide number of posts per feed page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key the presentation layer must send (None disables the check)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Posts per feed page
    pub page_size: u32,
    /// Whether the global feed is served through the read-through cache
    pub feed_cache: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Also returns one note per invalid value that was replaced by its
    /// default. Logging is not set up yet at this point, so the caller logs them.
    pub fn from_env() -> (Self, Vec<String>) {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> (Self, Vec<String>) {
        let mut fallbacks = Vec::new();

        let api_psk = var("YATUBE_API_PSK").filter(|s| !s.is_empty());

        let db_path = var("YATUBE_DB_PATH")
            .unwrap_or_else(|| "./data/yatube.sqlite".to_string())
            .into();

        let bind_addr = match var("YATUBE_BIND_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                fallbacks.push(format!(
                    "Invalid YATUBE_BIND_ADDR {:?}, using {}",
                    raw, DEFAULT_BIND_ADDR
                ));
                default_bind_addr()
            }),
            None => default_bind_addr(),
        };

        let log_level = var("YATUBE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let page_size = match var("YATUBE_PAGE_SIZE") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    fallbacks.push(format!(
                        "Invalid YATUBE_PAGE_SIZE {:?}, using {}",
                        raw, DEFAULT_PAGE_SIZE
                    ));
                    DEFAULT_PAGE_SIZE
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        let feed_cache = var("YATUBE_FEED_CACHE")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
            .unwrap_or(true);

        let config = Self {
            api_psk,
            db_path,
            bind_addr,
            log_level,
            page_size,
            feed_cache,
        };
        (config, fallbacks)
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
