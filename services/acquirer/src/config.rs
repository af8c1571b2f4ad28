//! Service configuration loaded from a YAML file.

use std::path::Path;

use acquisition::{AcquisitionConfig, GeocoderConfig, ParserConfig, RemoteServiceConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

/// Root of `config/acquirer.yaml`. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub remote: RemoteServiceConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub parser: ParserConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Overlay environment variables. Secrets are only read from here.
    pub fn with_env_overrides(mut self) -> Self {
        self.acquisition = self.acquisition.with_env_overrides();

        if let Ok(url) = std::env::var("RASTER_SERVICE_URL") {
            self.remote.base_url = url;
        }
        if let Ok(key) = std::env::var("RASTER_SERVICE_API_KEY") {
            self.remote.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("GEOCODER_URL") {
            self.geocoder.base_url = url;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.parser.api_key = Some(key);
        }

        self
    }

    pub fn validate(&self) -> Result<()> {
        self.acquisition
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid acquisition config: {e}"))?;

        if self.remote.pixel_cap != self.acquisition.service_pixel_cap {
            warn!(
                remote = self.remote.pixel_cap,
                acquisition = self.acquisition.service_pixel_cap,
                "Remote pixel cap differs from the planner's service cap"
            );
        }
        Ok(())
    }
}
