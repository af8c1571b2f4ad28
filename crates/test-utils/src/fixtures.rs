//! Common test fixtures for acquisition tests.

/// Common bounding box definitions as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Chicago city extent (0.42° x 0.39°).
    pub const CHICAGO: (f64, f64, f64, f64) = (-87.94, 41.64, -87.52, 42.03);

    /// Chicago Loop, small enough for a single request at 30 m.
    pub const CHICAGO_LOOP: (f64, f64, f64, f64) = (-87.70, 41.83, -87.60, 41.93);

    /// A large metro extent (0.6° x 0.5°) around Houston.
    pub const LARGE_METRO: (f64, f64, f64, f64) = (-95.70, 29.50, -95.10, 30.00);

    /// Greater London, outside continental-USA coverage.
    pub const LONDON: (f64, f64, f64, f64) = (-0.51, 51.28, 0.33, 51.69);

    /// Central London, small enough for quick end-to-end runs.
    pub const LONDON_CENTRAL: (f64, f64, f64, f64) = (-0.15, 51.48, -0.05, 51.54);

    /// A tiny extent near Denver for fast end-to-end tests.
    pub const DENVER_TINY: (f64, f64, f64, f64) = (-105.00, 39.70, -104.98, 39.72);

    /// Continental United States
    pub const CONUS: (f64, f64, f64, f64) = (-125.0, 24.0, -66.5, 49.5);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Scales in meters per pixel.
pub mod scale {
    pub const LANDSAT: f64 = 30.0;
    pub const WORLDPOP: f64 = 100.0;
}

/// Meters per degree used by the flat approximation.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Degrees spanning exactly `pixels` whole pixels at `scale` under the flat
/// approximation, placed mid-pixel so truncation lands on `pixels`.
pub fn degrees_for_pixels(pixels: usize, scale: f64) -> f64 {
    (pixels as f64 + 0.5) * scale / METERS_PER_DEGREE
}
