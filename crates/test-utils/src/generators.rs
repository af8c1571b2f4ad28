//! Test data generators for creating synthetic raster data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being placed correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a test window whose values continue the global `create_test_grid`
/// pattern, as if cut from a larger grid at (`row_start`, `col_start`).
///
/// ```
/// use test_utils::{create_test_grid, create_test_window};
///
/// let full = create_test_grid(8, 6);
/// let window = create_test_window(2, 3, 4, 2);
/// assert_eq!(window[0], full[2 * 8 + 3]);
/// ```
pub fn create_test_window(
    row_start: usize,
    col_start: usize,
    width: usize,
    height: usize,
) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in row_start..row_start + height {
        for col in col_start..col_start + width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a land-cover-like categorical grid using NLCD class codes.
pub fn create_landcover_grid(width: usize, height: usize) -> Vec<f32> {
    const CLASSES: [f32; 8] = [11.0, 21.0, 22.0, 23.0, 41.0, 42.0, 81.0, 90.0];
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(CLASSES[(row / 4 + col / 4) % CLASSES.len()]);
        }
    }
    data
}
