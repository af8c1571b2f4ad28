//! Client interface to the remote raster computation service.
//!
//! The service evaluates a [`RasterSource`] over a region and returns either
//! an encoded GeoTIFF (small regions) or a row-major pixel array for one
//! rectangular window. Every request is subject to a per-request pixel cap.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use geo_common::BoundingBox;
use grid_processor::{pixel_dimensions, TileDescriptor};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::catalog::RasterSource;
use crate::error::{AcquisitionError, Result, ServiceError};

/// A row-major block of pixels returned for one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelWindow {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl PixelWindow {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Check the window has the shape of `tile` and a matching data length.
    pub fn check_shape(&self, tile: &TileDescriptor) -> std::result::Result<(), ServiceError> {
        if self.width != tile.pixel_width
            || self.height != tile.pixel_height
            || self.data.len() != self.width * self.height
        {
            return Err(ServiceError::ShapeMismatch {
                expected_width: tile.pixel_width,
                expected_height: tile.pixel_height,
                actual_width: self.width,
                actual_height: if self.width == 0 {
                    self.height
                } else {
                    self.data.len() / self.width
                },
            });
        }
        Ok(())
    }
}

/// Remote raster evaluation.
#[async_trait]
pub trait RasterService: Send + Sync {
    /// Evaluate `source` over `bbox` at `scale` meters per pixel and return
    /// the result encoded as a GeoTIFF.
    async fn fetch_encoded(
        &self,
        source: &RasterSource,
        bbox: &BoundingBox,
        scale: f64,
    ) -> std::result::Result<Bytes, ServiceError>;

    /// Evaluate `source` over the pixel grid of one tile.
    async fn fetch_pixels(
        &self,
        source: &RasterSource,
        tile: &TileDescriptor,
        scale: f64,
    ) -> std::result::Result<PixelWindow, ServiceError>;
}

/// Connection settings for the HTTP raster service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteServiceConfig {
    /// Base URL, e.g. `https://raster.example.com/v1`.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub api_key: Option<String>,

    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,

    /// Requests larger than this are refused before being sent.
    pub pixel_cap: u64,
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090/v1".to_string(),
            api_key: None,
            request_timeout_secs: 300,
            pixel_cap: 262_144,
        }
    }
}

/// [`RasterService`] over HTTP + JSON.
pub struct HttpRasterService {
    client: Client,
    config: RemoteServiceConfig,
}

#[derive(Debug, Deserialize)]
struct PixelResponse {
    width: usize,
    height: usize,
    values: Vec<Option<f32>>,
}

impl HttpRasterService {
    pub fn new(config: RemoteServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| AcquisitionError::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<reqwest::Response, ServiceError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(classify_response(status, &text))
    }
}

#[async_trait]
impl RasterService for HttpRasterService {
    async fn fetch_encoded(
        &self,
        source: &RasterSource,
        bbox: &BoundingBox,
        scale: f64,
    ) -> std::result::Result<Bytes, ServiceError> {
        let (width, height) = pixel_dimensions(bbox, scale);
        let pixels = width as u64 * height as u64;
        if pixels > self.config.pixel_cap {
            return Err(ServiceError::SizeLimitExceeded(format!(
                "{width}x{height} = {pixels} pixels, cap is {}",
                self.config.pixel_cap
            )));
        }

        debug!(source = %source, %bbox, scale, "Requesting encoded raster");
        let body = json!({
            "expression": source,
            "region": bbox.to_geojson(),
            "scale": scale,
            "crs": "EPSG:4326",
            "format": "GEO_TIFF",
        });

        let response = self.post("encoded", &body).await?;
        response.bytes().await.map_err(classify_transport_error)
    }

    async fn fetch_pixels(
        &self,
        source: &RasterSource,
        tile: &TileDescriptor,
        scale: f64,
    ) -> std::result::Result<PixelWindow, ServiceError> {
        if tile.pixel_count() as u64 > self.config.pixel_cap {
            return Err(ServiceError::SizeLimitExceeded(format!(
                "tile of {} pixels, cap is {}",
                tile.pixel_count(),
                self.config.pixel_cap
            )));
        }

        let g = &tile.geo_bounds;
        let body = json!({
            "expression": source,
            "scale": scale,
            "grid": {
                "crs": "EPSG:4326",
                "dimensions": { "width": tile.pixel_width, "height": tile.pixel_height },
                "affine_transform": {
                    "scale_x": g.width() / tile.pixel_width as f64,
                    "shear_x": 0.0,
                    "translate_x": g.min_lon(),
                    "shear_y": 0.0,
                    "scale_y": -(g.height() / tile.pixel_height as f64),
                    "translate_y": g.max_lat(),
                },
            },
            "format": "JSON",
        });

        let response = self.post("pixels", &body).await?;
        let parsed: PixelResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        let data = parsed
            .values
            .into_iter()
            .map(|v| v.unwrap_or(f32::NAN))
            .collect();
        Ok(PixelWindow::new(parsed.width, parsed.height, data))
    }
}

/// Map an HTTP error status and body to a [`ServiceError`].
pub fn classify_response(status: StatusCode, body: &str) -> ServiceError {
    let snippet: String = body.chars().take(300).collect();
    let lower = snippet.to_lowercase();

    let mentions_size = lower.contains("must be less than or equal to")
        || lower.contains("request size")
        || lower.contains("too large")
        || lower.contains("pixel limit");

    if status == StatusCode::PAYLOAD_TOO_LARGE
        || (status == StatusCode::BAD_REQUEST && mentions_size)
    {
        return ServiceError::SizeLimitExceeded(format!("{status}: {snippet}"));
    }

    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        return ServiceError::Transient(format!("{status}: {snippet}"));
    }

    ServiceError::Rejected(format!("{status}: {snippet}"))
}

fn classify_transport_error(err: reqwest::Error) -> ServiceError {
    if err.is_decode() || err.is_body() {
        ServiceError::Decode(err.to_string())
    } else {
        ServiceError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(width: usize, height: usize) -> TileDescriptor {
        TileDescriptor {
            tile_row: 0,
            tile_col: 0,
            pixel_row_start: 0,
            pixel_col_start: 0,
            pixel_height: height,
            pixel_width: width,
            geo_bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap(),
        }
    }

    #[test]
    fn test_classify_size_limit() {
        let err = classify_response(
            StatusCode::BAD_REQUEST,
            "Total request size (1048576 pixels) must be less than or equal to 262144 pixels.",
        );
        assert!(matches!(err, ServiceError::SizeLimitExceeded(_)));
        assert!(matches!(
            classify_response(StatusCode::PAYLOAD_TOO_LARGE, ""),
            ServiceError::SizeLimitExceeded(_)
        ));
    }

    #[test]
    fn test_classify_transient_and_rejected() {
        assert!(matches!(
            classify_response(StatusCode::SERVICE_UNAVAILABLE, "busy"),
            ServiceError::Transient(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::TOO_MANY_REQUESTS, ""),
            ServiceError::Transient(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::BAD_REQUEST, "band 'B99' not found"),
            ServiceError::Rejected(_)
        ));
        assert!(matches!(
            classify_response(StatusCode::UNAUTHORIZED, ""),
            ServiceError::Rejected(_)
        ));
    }

    #[test]
    fn test_window_shape_check() {
        let window = PixelWindow::new(3, 2, vec![0.0; 6]);
        assert!(window.check_shape(&tile(3, 2)).is_ok());
        assert!(matches!(
            window.check_shape(&tile(4, 2)),
            Err(ServiceError::ShapeMismatch { expected_width: 4, .. })
        ));

        let short = PixelWindow::new(3, 2, vec![0.0; 5]);
        assert!(short.check_shape(&tile(3, 2)).is_err());
    }

    #[tokio::test]
    async fn test_oversized_encoded_request_refused_locally() {
        let service = HttpRasterService::new(RemoteServiceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Default::default()
        })
        .unwrap();
        let chicago = BoundingBox::new(-87.94, 41.64, -87.52, 42.03).unwrap();
        let source = RasterSource::image("asset", "b1");

        let result = service.fetch_encoded(&source, &chicago, 30.0).await;
        assert!(matches!(result, Err(ServiceError::SizeLimitExceeded(_))));
    }
}
