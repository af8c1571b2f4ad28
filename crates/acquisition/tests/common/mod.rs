//! In-memory stand-ins for the remote raster service and the geocoder.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acquisition::{
    AcquisitionConfig, AcquisitionError, AcquisitionMetrics, AcquisitionPipeline, GeocodedPlace,
    Geocoder, PixelWindow, RasterService, RasterSource, RetryPolicy, ServiceError,
};
use async_trait::async_trait;
use bytes::Bytes;
use geo_common::{BoundingBox, Crs};
use grid_processor::{
    encode_geotiff, geotransform, pixel_dimensions, DataType, RasterBuffer, TileDescriptor,
};
use test_utils::{create_test_window, TestWorkspace};

pub const MOCK_VALUE: f32 = 5.0;

/// Evaluates every source to a constant (or to the `create_test_grid`
/// pattern) and fails on request.
#[derive(Default)]
pub struct MockRasterService {
    /// Every request for these bands fails with a transient error.
    pub failing_bands: Vec<String>,
    /// Pixel requests for this tile fail with a transient error.
    pub failing_tile: Option<(usize, usize)>,
    /// Direct requests are refused as too large.
    pub direct_size_limit: bool,
    /// Pixel windows follow `create_test_window` instead of a constant.
    pub pattern: bool,
    /// Direct responses are 8-bit with nodata 255 instead of float with
    /// nodata 0.
    pub encoded_uint8: bool,
    /// Sleep before answering.
    pub delay: Option<Duration>,
    pub encoded_calls: AtomicU32,
    pub pixel_calls: AtomicU32,
    pub in_flight: AtomicUsize,
    /// Most pixel requests ever served at once.
    pub peak_in_flight: AtomicUsize,
}

impl MockRasterService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_band(mut self, band: &str) -> Self {
        self.failing_bands.push(band.to_string());
        self
    }

    fn fails(&self, source: &RasterSource) -> bool {
        self.failing_bands.iter().any(|b| *b == source.band)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RasterService for MockRasterService {
    async fn fetch_encoded(
        &self,
        source: &RasterSource,
        bbox: &BoundingBox,
        scale: f64,
    ) -> Result<Bytes, ServiceError> {
        self.encoded_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.direct_size_limit {
            return Err(ServiceError::SizeLimitExceeded(
                "Total request size must be less than or equal to 262144 pixels".into(),
            ));
        }
        if self.fails(source) {
            return Err(ServiceError::Transient(format!("{} unavailable", source.band)));
        }

        let (width, height) = pixel_dimensions(bbox, scale);
        let raster = RasterBuffer::filled(
            width,
            height,
            1,
            MOCK_VALUE,
            Crs::wgs84(),
            geotransform(bbox, width, height),
        )
        .map_err(|e| ServiceError::Decode(e.to_string()))?;
        let raster = if self.encoded_uint8 {
            raster.with_nodata(Some(255.0)).with_dtype(DataType::UInt8)
        } else {
            raster.with_nodata(Some(0.0))
        };

        encode_geotiff(&raster)
            .map(Bytes::from)
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn fetch_pixels(
        &self,
        source: &RasterSource,
        tile: &TileDescriptor,
        _scale: f64,
    ) -> Result<PixelWindow, ServiceError> {
        self.pixel_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.pause().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fails(source) || self.failing_tile == Some((tile.tile_row, tile.tile_col)) {
            return Err(ServiceError::Transient(format!(
                "tile ({}, {}) timed out",
                tile.tile_row, tile.tile_col
            )));
        }

        let data = if self.pattern {
            create_test_window(
                tile.pixel_row_start,
                tile.pixel_col_start,
                tile.pixel_width,
                tile.pixel_height,
            )
        } else {
            vec![MOCK_VALUE; tile.pixel_count()]
        };
        Ok(PixelWindow::new(tile.pixel_width, tile.pixel_height, data))
    }
}

/// Resolves names from a fixed table.
#[derive(Default)]
pub struct MockGeocoder {
    places: HashMap<String, BoundingBox>,
}

impl MockGeocoder {
    pub fn with(mut self, name: &str, bbox: (f64, f64, f64, f64)) -> Self {
        self.places.insert(name.to_string(), bbox_of(bbox));
        self
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, location: &str) -> acquisition::Result<GeocodedPlace> {
        let bbox = self
            .places
            .get(location)
            .copied()
            .ok_or_else(|| AcquisitionError::geocode(location, "no results"))?;
        let (center_lon, center_lat) = bbox.center();
        Ok(GeocodedPlace {
            bbox,
            center_lat,
            center_lon,
            name: location.to_string(),
        })
    }
}

pub fn bbox_of(b: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(b.0, b.1, b.2, b.3).unwrap()
}

/// Defaults pointed at the workspace, with instant retries.
pub fn test_config(ws: &TestWorkspace) -> AcquisitionConfig {
    AcquisitionConfig {
        output_dir: ws.output_dir(),
        temp_dir: ws.temp_dir(),
        retry: RetryPolicy::fixed(3, Duration::ZERO),
        ..Default::default()
    }
}

/// Small tiles so modest regions are tiled.
pub fn small_tile_config(ws: &TestWorkspace) -> AcquisitionConfig {
    AcquisitionConfig {
        tile_side: 50,
        direct_pixel_ceiling: 2_500,
        ..test_config(ws)
    }
}

pub fn pipeline(
    config: AcquisitionConfig,
    service: Arc<MockRasterService>,
) -> (AcquisitionPipeline, Arc<AcquisitionMetrics>) {
    let metrics = Arc::new(AcquisitionMetrics::new());
    let pipeline = AcquisitionPipeline::new(config, service, metrics.clone()).unwrap();
    (pipeline, metrics)
}

pub fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
