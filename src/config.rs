//! Service configuration with environment variable overrides
//! Reads MEMDECK_API_URL, MEMDECK_API_TOKEN and MEMDECK_TIMEOUT_SECS,
//! falling back to local-development defaults

use serde::{Deserialize, Serialize};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote memory service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the backend, no trailing slash
    pub base_url: String,
    /// Bearer token attached to every request, if any
    pub api_token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ServiceConfig {
    /// Build a config from the environment, loading `.env` first if present
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let base_url = std::env::var("MEMDECK_API_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_token = std::env::var("MEMDECK_API_TOKEN").ok().filter(|t| !t.is_empty());

        let timeout_secs = std::env::var("MEMDECK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url,
            api_token,
            timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.api_token.is_none());
    }
}
