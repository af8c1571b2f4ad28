//! Bounding box types and operations.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{GeoError, GeoResult};

/// A geographic bounding box in degrees (lon/lat, WGS84).
///
/// The constructor enforces `min < max` on both axes, so every value of this
/// type describes a non-degenerate region. Deserialization goes through the
/// same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BboxFields", into = "BboxFields")]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct BboxFields {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl TryFrom<BboxFields> for BoundingBox {
    type Error = GeoError;

    fn try_from(f: BboxFields) -> GeoResult<Self> {
        BoundingBox::new(f.min_lon, f.min_lat, f.max_lon, f.max_lat)
    }
}

impl From<BoundingBox> for BboxFields {
    fn from(b: BoundingBox) -> Self {
        Self {
            min_lon: b.min_lon,
            min_lat: b.min_lat,
            max_lon: b.max_lon,
            max_lat: b.max_lat,
        }
    }
}

impl BoundingBox {
    /// Create a bounding box, rejecting inverted, empty or non-finite extents.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> GeoResult<Self> {
        if ![min_lon, min_lat, max_lon, max_lat].iter().all(|v| v.is_finite()) {
            return Err(GeoError::invalid_bbox("coordinates must be finite"));
        }
        if min_lon >= max_lon {
            return Err(GeoError::invalid_bbox(format!(
                "min_lon ({min_lon}) must be less than max_lon ({max_lon})"
            )));
        }
        if min_lat >= max_lat {
            return Err(GeoError::invalid_bbox(format!(
                "min_lat ({min_lat}) must be less than max_lat ({max_lat})"
            )));
        }
        if min_lon < -180.0 || max_lon > 180.0 || min_lat < -90.0 || max_lat > 90.0 {
            return Err(GeoError::invalid_bbox(format!(
                "({min_lon}, {min_lat}, {max_lon}, {max_lat}) is outside lon/lat range"
            )));
        }

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Center point as (lon, lat).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// Check if this bbox overlaps another with non-zero area.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon < other.max_lon
            && self.max_lon > other.min_lon
            && self.min_lat < other.max_lat
            && self.max_lat > other.min_lat
    }

    /// Check if a point is contained within this bbox (edges inclusive).
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Closed exterior ring, counter-clockwise from the south-west corner.
    pub fn ring(&self) -> [(f64, f64); 5] {
        [
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
            (self.min_lon, self.min_lat),
        ]
    }

    /// GeoJSON Polygon geometry for this box.
    pub fn to_geojson(&self) -> serde_json::Value {
        let coords: Vec<[f64; 2]> = self.ring().iter().map(|&(x, y)| [x, y]).collect();
        json!({
            "type": "Polygon",
            "coordinates": [coords],
        })
    }

    /// The same rectangle as an untyped extent in degrees.
    pub fn to_extent(&self) -> Extent {
        Extent::new(self.min_lon, self.min_lat, self.max_lon, self.max_lat)
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:.6}, {:.6}, {:.6}, {:.6}]",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// An axis-aligned rectangle in the units of some CRS.
///
/// For geographic CRS coordinates are in degrees, for projected CRS
/// (EPSG:5070 etc.) they are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest extent containing every point, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        let (x0, y0) = iter.next()?;
        let mut extent = Self::new(x0, y0, x0, y0);
        for (x, y) in iter {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        Some(extent)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two extents.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.intersects(other) {
            return None;
        }

        Some(Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_bbox() {
        assert!(BoundingBox::new(-87.5, 41.6, -87.9, 42.0).is_err());
        assert!(BoundingBox::new(-87.9, 42.0, -87.5, 41.6).is_err());
        assert!(BoundingBox::new(-87.9, 41.6, -87.9, 42.0).is_err());
        assert!(BoundingBox::new(f64::NAN, 41.6, -87.5, 42.0).is_err());
        assert!(BoundingBox::new(-190.0, 41.6, -87.5, 42.0).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: BoundingBox = serde_json::from_str(
            r#"{"min_lon":-87.94,"min_lat":41.64,"max_lon":-87.52,"max_lat":42.03}"#,
        )
        .unwrap();
        assert_eq!(ok.min_lon(), -87.94);

        let bad = serde_json::from_str::<BoundingBox>(
            r#"{"min_lon":-87.52,"min_lat":41.64,"max_lon":-87.94,"max_lat":42.03}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_serialize_field_names() {
        let bbox = BoundingBox::new(-1.0, 2.0, 3.0, 4.0).unwrap();
        let value = serde_json::to_value(bbox).unwrap();
        assert_eq!(value["min_lon"], -1.0);
        assert_eq!(value["max_lat"], 4.0);
    }

    #[test]
    fn test_geojson_ring_is_closed() {
        let bbox = BoundingBox::new(-1.0, 2.0, 3.0, 4.0).unwrap();
        let geojson = bbox.to_geojson();
        let ring = geojson["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(geojson["type"], "Polygon");
    }

    #[test]
    fn test_extent_intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(5.0, 5.0, 15.0, 15.0);
        let c = Extent::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection, Extent::new(5.0, 5.0, 10.0, 10.0));
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_extent_from_points_skips_non_finite() {
        let extent =
            Extent::from_points(vec![(1.0, 5.0), (f64::INFINITY, 0.0), (-2.0, 3.0)]).unwrap();
        assert_eq!(extent, Extent::new(-2.0, 3.0, 1.0, 5.0));
        assert!(Extent::from_points(Vec::new()).is_none());
    }
}
