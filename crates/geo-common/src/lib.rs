//! Geographic primitives shared across the raster acquisition workspace.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod transform;

pub use bbox::{BoundingBox, Extent};
pub use crs::{Crs, CrsTransform};
pub use error::{GeoError, GeoResult};
pub use transform::GeoTransform;
