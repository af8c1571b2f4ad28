//! Configuration for the grid processor.

use crate::types::InterpolationMethod;
use serde::{Deserialize, Serialize};

/// Configuration for spatial processing (clip, reproject, align).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridProcessorConfig {
    /// Interpolation method for grid resampling.
    pub interpolation: InterpolationMethod,

    /// Segments sampled along each bbox edge when projecting outlines and extents.
    pub densify_samples: usize,

    /// Nodata value used when a source raster defines none.
    pub default_nodata: f32,

    /// Upper bound on pixels per band for a computed output grid.
    pub max_output_pixels: u64,
}

impl Default for GridProcessorConfig {
    fn default() -> Self {
        Self {
            interpolation: InterpolationMethod::Bilinear,
            densify_samples: 21,
            default_nodata: 255.0,
            max_output_pixels: 400_000_000,
        }
    }
}

impl GridProcessorConfig {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overlay `GRID_*` environment variables. Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("GRID_INTERPOLATION") {
            self.interpolation = InterpolationMethod::from_str(&val);
        }
        if let Some(n) = env_parse("GRID_DENSIFY_SAMPLES") {
            self.densify_samples = n;
        }
        if let Some(v) = env_parse("GRID_DEFAULT_NODATA") {
            self.default_nodata = v;
        }
        if let Some(v) = env_parse("GRID_MAX_OUTPUT_PIXELS") {
            self.max_output_pixels = v;
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.densify_samples == 0 {
            return Err("densify_samples must be > 0".to_string());
        }

        if self.default_nodata.is_nan() {
            return Err("default_nodata must be a number".to_string());
        }

        if self.max_output_pixels == 0 {
            return Err("max_output_pixels must be > 0".to_string());
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}
