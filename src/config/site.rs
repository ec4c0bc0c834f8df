//! Site configuration (curator.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CuratorConfig {
    // Site
    pub title: String,
    pub url: String,

    // Remote store
    pub store_url: String,
    pub store_api_key: Option<String>,
    pub request_timeout_secs: u64,

    // Assets
    /// Base for public asset URLs; defaults to the store URL
    pub asset_public_base: Option<String>,
    /// Objects younger than this are never swept
    pub sweep_grace_secs: u64,

    // Server
    pub server_ip: String,
    pub server_port: u16,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            title: "Curator Site".to_string(),
            url: "http://example.com".to_string(),

            store_url: "http://localhost:54321".to_string(),
            store_api_key: None,
            request_timeout_secs: 30,

            asset_public_base: None,
            sweep_grace_secs: 3600,

            server_ip: "localhost".to_string(),
            server_port: 4000,
        }
    }
}

impl CuratorConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: CuratorConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Ambient timeout applied to every remote call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sweep_grace(&self) -> Duration {
        Duration::from_secs(self.sweep_grace_secs)
    }

    /// Base for public asset URLs
    pub fn asset_base(&self) -> &str {
        self.asset_public_base.as_deref().unwrap_or(&self.store_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "title: My Site").unwrap();
        writeln!(file, "store_url: https://store.example.com").unwrap();

        let config = CuratorConfig::load(file.path()).unwrap();
        assert_eq!(config.title, "My Site");
        assert_eq!(config.store_url, "https://store.example.com");
        assert_eq!(config.server_port, 4000);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_asset_base_falls_back_to_store_url() {
        let mut config = CuratorConfig::default();
        assert_eq!(config.asset_base(), config.store_url);

        config.asset_public_base = Some("https://cdn.example.com".to_string());
        assert_eq!(config.asset_base(), "https://cdn.example.com");
    }
}
