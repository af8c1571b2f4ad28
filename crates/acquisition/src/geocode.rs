//! Place name to bounding box lookup.

use std::time::Duration;

use async_trait::async_trait;
use geo_common::BoundingBox;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{AcquisitionError, Result};

/// A resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPlace {
    pub bbox: BoundingBox,
    pub center_lat: f64,
    pub center_lon: f64,
    /// Canonical name returned by the geocoder.
    pub name: String,
}

/// Resolves a free-text location.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Failure is reported as [`AcquisitionError::GeocodeFailure`].
    async fn geocode(&self, location: &str) -> Result<GeocodedPlace>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Nominatim-compatible search endpoint base.
    pub base_url: String,
    /// Nominatim requires an identifying user agent.
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "raster-acquirer".to_string(),
            timeout_secs: 30,
        }
    }
}

/// [`Geocoder`] backed by a Nominatim search API.
pub struct NominatimGeocoder {
    client: Client,
    config: GeocoderConfig,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    /// `[min_lat, max_lat, min_lon, max_lon]` as strings.
    boundingbox: Vec<String>,
    lat: String,
    lon: String,
    display_name: String,
}

impl NominatimGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AcquisitionError::config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, location: &str) -> Result<GeocodedPlace> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("q", location), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| AcquisitionError::geocode(location, e.to_string()))?;

        if !response.status().is_success() {
            return Err(AcquisitionError::geocode(
                location,
                format!("geocoder returned {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AcquisitionError::geocode(location, e.to_string()))?;
        let place = parse_search_response(location, &body)?;
        debug!(name = %place.name, bbox = %place.bbox, "Location resolved");
        Ok(place)
    }
}

/// Take the first hit of a Nominatim JSON search response.
pub fn parse_search_response(location: &str, body: &str) -> Result<GeocodedPlace> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)
        .map_err(|e| AcquisitionError::geocode(location, format!("bad response: {e}")))?;
    let hit = hits
        .into_iter()
        .next()
        .ok_or_else(|| AcquisitionError::geocode(location, "no results"))?;

    let num = |s: &str| -> Result<f64> {
        s.trim()
            .parse()
            .map_err(|_| AcquisitionError::geocode(location, format!("not a number: '{s}'")))
    };

    if hit.boundingbox.len() != 4 {
        return Err(AcquisitionError::geocode(location, "bounding box is empty or invalid"));
    }
    let (min_lat, max_lat) = (num(&hit.boundingbox[0])?, num(&hit.boundingbox[1])?);
    let (min_lon, max_lon) = (num(&hit.boundingbox[2])?, num(&hit.boundingbox[3])?);

    let bbox = BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
        .map_err(|e| AcquisitionError::geocode(location, e.to_string()))?;

    Ok(GeocodedPlace {
        bbox,
        center_lat: num(&hit.lat)?,
        center_lon: num(&hit.lon)?,
        name: hit.display_name,
    })
}
