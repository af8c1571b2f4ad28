//! Tile and direct fetches with bounded retry.

use std::sync::Arc;

use bytes::Bytes;
use geo_common::BoundingBox;
use grid_processor::TileDescriptor;
use tracing::{debug, instrument, warn};

use crate::catalog::RasterSource;
use crate::error::{AcquisitionError, Result, ServiceError};
use crate::metrics::AcquisitionMetrics;
use crate::retry::RetryPolicy;
use crate::service::{PixelWindow, RasterService};

/// Fetches pixels from a [`RasterService`], retrying retryable failures.
#[derive(Clone)]
pub struct TileFetcher {
    service: Arc<dyn RasterService>,
    retry: RetryPolicy,
    metrics: Arc<AcquisitionMetrics>,
}

impl TileFetcher {
    pub fn new(
        service: Arc<dyn RasterService>,
        retry: RetryPolicy,
        metrics: Arc<AcquisitionMetrics>,
    ) -> Self {
        Self {
            service,
            retry,
            metrics,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch one tile's pixel window.
    ///
    /// A window of the wrong shape counts as a failed attempt; it is never
    /// resized. After the last attempt the error names the tile.
    #[instrument(skip(self, source, tile), fields(tile_row = tile.tile_row, tile_col = tile.tile_col))]
    pub async fn fetch(
        &self,
        source: &RasterSource,
        tile: &TileDescriptor,
        scale: f64,
    ) -> Result<PixelWindow> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let result = match self.service.fetch_pixels(source, tile, scale).await {
                Ok(window) => window.check_shape(tile).map(|()| window),
                Err(e) => Err(e),
            };

            match result {
                Ok(window) => {
                    self.metrics.record_tile_fetched();
                    debug!(attempt, pixels = tile.pixel_count(), "Tile fetched");
                    return Ok(window);
                }
                Err(e) if e.is_retryable() && self.retry.can_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        error = %e,
                        retry = attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Tile fetch failed, retrying"
                    );
                    self.metrics.record_tile_retry(e.kind());
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    self.metrics.record_tile_failure();
                    return Err(AcquisitionError::TileFetchFailure {
                        row: tile.tile_row,
                        col: tile.tile_col,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Fetch `bbox` as one encoded raster.
    ///
    /// Retryable failures are retried; a size-limit error is returned as is
    /// so the caller can switch to tiles.
    #[instrument(skip(self, source))]
    pub async fn fetch_direct(
        &self,
        source: &RasterSource,
        bbox: &BoundingBox,
        scale: f64,
    ) -> std::result::Result<Bytes, ServiceError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.service.fetch_encoded(source, bbox, scale).await {
                Ok(bytes) => {
                    self.metrics.record_direct_fetch();
                    debug!(attempt, bytes = bytes.len(), "Direct fetch complete");
                    return Ok(bytes);
                }
                Err(e) if e.is_retryable() && self.retry.can_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        error = %e,
                        retry = attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Direct fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls with `error`, then returns a window
    /// of `shape`.
    struct Scripted {
        failures: u32,
        error: ServiceError,
        shape: (usize, usize),
        calls: AtomicU32,
    }

    #[async_trait]
    impl RasterService for Scripted {
        async fn fetch_encoded(
            &self,
            _source: &RasterSource,
            _bbox: &BoundingBox,
            _scale: f64,
        ) -> std::result::Result<Bytes, ServiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(self.error.clone());
            }
            Ok(Bytes::from_static(b"tiff"))
        }

        async fn fetch_pixels(
            &self,
            _source: &RasterSource,
            _tile: &TileDescriptor,
            _scale: f64,
        ) -> std::result::Result<PixelWindow, ServiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(self.error.clone());
            }
            let (w, h) = self.shape;
            Ok(PixelWindow::new(w, h, vec![1.0; w * h]))
        }
    }

    fn tile() -> TileDescriptor {
        TileDescriptor {
            tile_row: 1,
            tile_col: 2,
            pixel_row_start: 4,
            pixel_col_start: 8,
            pixel_height: 4,
            pixel_width: 4,
            geo_bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap(),
        }
    }

    fn fetcher(service: Arc<Scripted>) -> (TileFetcher, Arc<AcquisitionMetrics>) {
        let metrics = Arc::new(AcquisitionMetrics::new());
        let fetcher = TileFetcher::new(
            service,
            RetryPolicy::fixed(3, Duration::ZERO),
            metrics.clone(),
        );
        (fetcher, metrics)
    }

    fn scripted(failures: u32, error: ServiceError, shape: (usize, usize)) -> Arc<Scripted> {
        Arc::new(Scripted {
            failures,
            error,
            shape,
            calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let service = scripted(2, ServiceError::Transient("503".into()), (4, 4));
        let (fetcher, metrics) = fetcher(service.clone());
        let source = RasterSource::image("a", "b");

        let window = fetcher.fetch(&source, &tile(), 30.0).await.unwrap();
        assert_eq!(window.data.len(), 16);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.snapshot().tile_retries, 2);
        assert_eq!(metrics.snapshot().tiles_fetched, 1);
    }

    #[tokio::test]
    async fn test_exhaustion_names_tile() {
        let service = scripted(u32::MAX, ServiceError::Transient("timeout".into()), (4, 4));
        let (fetcher, metrics) = fetcher(service.clone());
        let source = RasterSource::image("a", "b");

        let err = fetcher.fetch(&source, &tile(), 30.0).await.unwrap_err();
        match err {
            AcquisitionError::TileFetchFailure {
                row, col, attempts, ..
            } => {
                assert_eq!((row, col, attempts), (1, 2, 3));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.snapshot().tile_failures, 1);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_retried_never_resized() {
        let service = scripted(0, ServiceError::Transient(String::new()), (3, 4));
        let (fetcher, _) = fetcher(service.clone());
        let source = RasterSource::image("a", "b");

        let err = fetcher.fetch(&source, &tile(), 30.0).await.unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::TileFetchFailure {
                attempts: 3,
                source: ServiceError::ShapeMismatch { .. },
                ..
            }
        ));
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let service = scripted(u32::MAX, ServiceError::Rejected("bad band".into()), (4, 4));
        let (fetcher, _) = fetcher(service.clone());
        let source = RasterSource::image("a", "b");

        let err = fetcher.fetch(&source, &tile(), 30.0).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::TileFetchFailure { attempts: 1, .. }));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_direct_size_limit_returned_immediately() {
        let service = scripted(
            u32::MAX,
            ServiceError::SizeLimitExceeded("too big".into()),
            (4, 4),
        );
        let (fetcher, _) = fetcher(service.clone());
        let source = RasterSource::image("a", "b");
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap();

        let err = fetcher.fetch_direct(&source, &bbox, 30.0).await.unwrap_err();
        assert!(matches!(err, ServiceError::SizeLimitExceeded(_)));
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }
}
