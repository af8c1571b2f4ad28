//! Interpolation kernels for grid resampling.
//!
//! Positions are fractional grid indices where integer values fall on pixel
//! centers. Missing values are NaN or the optional nodata sentinel; a kernel
//! that only sees missing inputs returns NaN.

use crate::types::InterpolationMethod;

#[inline]
fn is_missing(value: f32, nodata: Option<f32>) -> bool {
    value.is_nan() || nodata.is_some_and(|nd| value == nd)
}

/// Nearest neighbor interpolation.
///
/// Returns the value of the nearest grid point.
pub fn nearest_interpolate(
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    nodata: Option<f32>,
) -> f32 {
    if x < -0.5 || y < -0.5 {
        return f32::NAN;
    }
    let col = x.round() as usize;
    let row = y.round() as usize;

    if col >= width || row >= height {
        return f32::NAN;
    }

    let value = data[row * width + col];
    if is_missing(value, nodata) {
        f32::NAN
    } else {
        value
    }
}

/// Bilinear interpolation.
///
/// Interpolates between the four nearest grid points. Missing corners are
/// dropped and the remaining weights renormalized, so a single nodata pixel
/// does not erase its neighbours.
pub fn bilinear_interpolate(
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    nodata: Option<f32>,
) -> f32 {
    if width == 0 || height == 0 || x < 0.0 || y < 0.0 {
        return f32::NAN;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    if x0 >= width || y0 >= height {
        return f32::NAN;
    }
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let corners = [
        (data[y0 * width + x0], (1.0 - xf) * (1.0 - yf)),
        (data[y0 * width + x1], xf * (1.0 - yf)),
        (data[y1 * width + x0], (1.0 - xf) * yf),
        (data[y1 * width + x1], xf * yf),
    ];

    let mut sum = 0.0f64;
    let mut weight = 0.0f64;
    for (value, w) in corners {
        if w > 0.0 && !is_missing(value, nodata) {
            sum += value as f64 * w;
            weight += w;
        }
    }

    if weight <= 0.0 {
        f32::NAN
    } else {
        (sum / weight) as f32
    }
}

/// Sample a grid at a fractional index with the given method.
///
/// Positions within half a pixel outside the grid are clamped onto the edge
/// pixels; anything further out is NaN.
pub fn sample(
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    method: InterpolationMethod,
    nodata: Option<f32>,
) -> f32 {
    let max_x = width as f64 - 0.5;
    let max_y = height as f64 - 0.5;
    if !(x >= -0.5 && x <= max_x && y >= -0.5 && y <= max_y) {
        return f32::NAN;
    }

    let cx = x.clamp(0.0, (width - 1) as f64);
    let cy = y.clamp(0.0, (height - 1) as f64);

    match method {
        InterpolationMethod::Nearest => nearest_interpolate(data, width, height, cx, cy, nodata),
        InterpolationMethod::Bilinear => bilinear_interpolate(data, width, height, cx, cy, nodata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];

        assert_eq!(nearest_interpolate(&data, 3, 3, 0.0, 0.0, None), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 1.0, 1.0, None), 5.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.4, 0.4, None), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.6, 0.6, None), 5.0);
        assert!(nearest_interpolate(&data, 3, 3, 0.0, 0.0, Some(1.0)).is_nan());
    }

    #[test]
    fn test_bilinear_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        // Corners
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 0.0, None), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 0.0, None), 2.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0, None), 3.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 1.0, None), 4.0);

        // Center
        let center = bilinear_interpolate(&data, 2, 2, 0.5, 0.5, None);
        assert!((center - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_bilinear_skips_missing_corners() {
        let data: Vec<f32> = vec![
            1.0, f32::NAN,
            3.0, 4.0,
        ];

        let result = bilinear_interpolate(&data, 2, 2, 0.5, 0.5, None);
        assert!((result - 8.0 / 3.0).abs() < 0.001);

        let sentinel: Vec<f32> = vec![
            1.0, 255.0,
            3.0, 4.0,
        ];
        let result = bilinear_interpolate(&sentinel, 2, 2, 0.5, 0.5, Some(255.0));
        assert!((result - 8.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_bilinear_all_missing() {
        let data = vec![255.0f32; 4];
        assert!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5, Some(255.0)).is_nan());
    }

    #[test]
    fn test_sample_edges() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        // Outer half-pixel clamps to the edge value
        assert_eq!(sample(&data, 2, 2, -0.4, -0.4, InterpolationMethod::Bilinear, None), 1.0);
        assert_eq!(sample(&data, 2, 2, 1.4, 1.4, InterpolationMethod::Bilinear, None), 4.0);
        assert!(sample(&data, 2, 2, -0.6, 0.0, InterpolationMethod::Bilinear, None).is_nan());
        assert!(sample(&data, 2, 2, 0.0, 1.6, InterpolationMethod::Nearest, None).is_nan());
    }
}
