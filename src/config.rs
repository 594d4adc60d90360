//! Host configuration from environment variables.
//!
//!   CRYPTGUARD_LOG_FORMAT     - "json" for structured logging, "pretty" for dev (default: pretty)
//!   CRYPTGUARD_NOTIFY_URL     - Notification endpoint, e.g. http://localhost:3001/api/notify-decryption
//!   CRYPTGUARD_BIND_METADATA  - "true" to authenticate the metadata header (default: false)

use crate::container::MetadataBinding;

pub const ENV_LOG_FORMAT: &str = "CRYPTGUARD_LOG_FORMAT";
pub const ENV_NOTIFY_URL: &str = "CRYPTGUARD_NOTIFY_URL";
pub const ENV_BIND_METADATA: &str = "CRYPTGUARD_BIND_METADATA";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub log_format: LogFormat,
    pub notify_url: Option<String>,
    pub binding: MetadataBinding,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unknown values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let log_format = match lookup(ENV_LOG_FORMAT).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let notify_url = lookup(ENV_NOTIFY_URL)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());

        let binding = match lookup(ENV_BIND_METADATA).as_deref() {
            Some("true") | Some("1") => MetadataBinding::Authenticated,
            _ => MetadataBinding::Unbound,
        };

        Self {
            log_format,
            notify_url,
            binding,
        }
    }
}
