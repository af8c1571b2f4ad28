//! Coordinate Reference System types and point/extent transformation.
//!
//! Projection math is delegated to `proj4rs`, with PROJ.4 definitions looked
//! up by EPSG code from the `crs-definitions` database.

use std::fmt;
use std::str::FromStr;

use proj4rs::proj::Proj;
use serde::{Deserialize, Serialize};

use crate::bbox::Extent;
use crate::error::{GeoError, GeoResult};

/// A CRS identified by EPSG code.
///
/// Only codes present in the definitions database can be constructed, so a
/// `Crs` value always has a usable PROJ.4 definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    epsg: u16,
}

impl Crs {
    /// WGS84 geographic (lon/lat degrees).
    pub fn wgs84() -> Self {
        Self { epsg: 4326 }
    }

    /// NAD83 / Conus Albers equal-area (meters).
    pub fn conus_albers() -> Self {
        Self { epsg: 5070 }
    }

    /// Build from a numeric EPSG code.
    pub fn from_epsg(epsg: u16) -> GeoResult<Self> {
        if crs_definitions::from_code(epsg).is_none() {
            return Err(GeoError::UnsupportedCrs(format!("EPSG:{epsg}")));
        }
        Ok(Self { epsg })
    }

    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:5070"
    /// - "epsg:4326"
    /// - "CRS:84" (lon/lat WGS84)
    pub fn parse(s: &str) -> GeoResult<Self> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(Self::wgs84());
        }

        let code = normalized
            .strip_prefix("EPSG:")
            .ok_or_else(|| GeoError::InvalidCrs(s.to_string()))?;
        let epsg: u16 = code
            .parse()
            .map_err(|_| GeoError::InvalidCrs(s.to_string()))?;

        Self::from_epsg(epsg)
    }

    pub fn epsg(&self) -> u16 {
        self.epsg
    }

    /// PROJ.4 definition string for this CRS.
    pub fn proj4(&self) -> GeoResult<&'static str> {
        crs_definitions::from_code(self.epsg)
            .map(|def| def.proj4)
            .ok_or_else(|| GeoError::UnsupportedCrs(self.to_string()))
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        match self.proj4() {
            Ok(def) => def.contains("+proj=longlat"),
            Err(_) => false,
        }
    }

    fn to_proj(self) -> GeoResult<Proj> {
        let def = self.proj4()?;
        Proj::from_proj_string(def)
            .map_err(|e| GeoError::projection(format!("invalid definition for {self}: {e:?}")))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = GeoError;

    fn from_str(s: &str) -> GeoResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Crs {
    type Error = GeoError;

    fn try_from(s: String) -> GeoResult<Self> {
        Self::parse(&s)
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

/// A prepared transformation between two CRS.
pub struct CrsTransform {
    source: Crs,
    target: Crs,
    projs: Option<(Proj, Proj)>,
}

impl fmt::Debug for CrsTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrsTransform")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl CrsTransform {
    pub fn new(source: Crs, target: Crs) -> GeoResult<Self> {
        // Same CRS is a no-op
        let projs = if source == target {
            None
        } else {
            Some((source.to_proj()?, target.to_proj()?))
        };

        Ok(Self {
            source,
            target,
            projs,
        })
    }

    pub fn source(&self) -> Crs {
        self.source
    }

    pub fn target(&self) -> Crs {
        self.target
    }

    /// Transform one point. Geographic coordinates are in degrees.
    pub fn convert(&self, x: f64, y: f64) -> GeoResult<(f64, f64)> {
        let Some((src, dst)) = &self.projs else {
            return Ok((x, y));
        };

        // proj4rs uses radians for geographic coordinates
        let mut point = if self.source.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        proj4rs::transform::transform(src, dst, &mut point).map_err(|e| {
            GeoError::projection(format!(
                "{} -> {} failed at ({x}, {y}): {e:?}",
                self.source, self.target
            ))
        })?;

        let out = if self.target.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out.0.is_finite() || !out.1.is_finite() {
            return Err(GeoError::projection(format!(
                "{} -> {} produced a non-finite point for ({x}, {y})",
                self.source, self.target
            )));
        }

        Ok(out)
    }

    /// Transform an extent by sampling `samples` segments along each edge.
    ///
    /// Edges of a rectangle are curves in most target CRS, so the corners
    /// alone under-estimate the result.
    pub fn convert_extent(&self, extent: &Extent, samples: usize) -> GeoResult<Extent> {
        if self.projs.is_none() {
            return Ok(*extent);
        }

        let n = samples.max(1);
        let mut points = Vec::with_capacity(4 * (n + 1));
        for i in 0..=n {
            let t = i as f64 / n as f64;
            let x = extent.min_x + t * extent.width();
            let y = extent.min_y + t * extent.height();
            for (px, py) in [
                (x, extent.min_y),
                (x, extent.max_y),
                (extent.min_x, y),
                (extent.max_x, y),
            ] {
                if let Ok(p) = self.convert(px, py) {
                    points.push(p);
                }
            }
        }

        Extent::from_points(points).ok_or_else(|| {
            GeoError::projection(format!(
                "no point of {:?} could be transformed from {} to {}",
                extent, self.source, self.target
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(Crs::parse("EPSG:5070").unwrap().epsg(), 5070);
        assert_eq!(Crs::parse("epsg:4326").unwrap(), Crs::wgs84());
        assert_eq!(Crs::parse("CRS:84").unwrap(), Crs::wgs84());
        assert!(Crs::parse("5070").is_err());
        assert!(Crs::parse("EPSG:abc").is_err());
        assert!(Crs::parse("EPSG:1").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let crs = Crs::conus_albers();
        assert_eq!(crs.to_string(), "EPSG:5070");
        assert_eq!(crs.to_string().parse::<Crs>().unwrap(), crs);
    }

    #[test]
    fn test_is_geographic() {
        assert!(Crs::wgs84().is_geographic());
        assert!(!Crs::conus_albers().is_geographic());
    }

    #[test]
    fn test_identity_transform() {
        let t = CrsTransform::new(Crs::wgs84(), Crs::wgs84()).unwrap();
        assert_eq!(t.convert(-87.6, 41.8).unwrap(), (-87.6, 41.8));
    }

    #[test]
    fn test_albers_round_trip() {
        let fwd = CrsTransform::new(Crs::wgs84(), Crs::conus_albers()).unwrap();
        let inv = CrsTransform::new(Crs::conus_albers(), Crs::wgs84()).unwrap();

        let (x, y) = fwd.convert(-87.6, 41.8).unwrap();
        // Chicago sits east of the -96 central meridian
        assert!(x > 0.0);
        assert!(y > 0.0);

        let (lon, lat) = inv.convert(x, y).unwrap();
        assert!((lon - -87.6).abs() < 1e-6);
        assert!((lat - 41.8).abs() < 1e-6);
    }

    #[test]
    fn test_densified_extent_contains_corners() {
        let t = CrsTransform::new(Crs::wgs84(), Crs::conus_albers()).unwrap();
        let extent = Extent::new(-90.0, 40.0, -85.0, 45.0);
        let projected = t.convert_extent(&extent, 21).unwrap();

        for (lon, lat) in [(-90.0, 40.0), (-85.0, 40.0), (-90.0, 45.0), (-85.0, 45.0)] {
            let (x, y) = t.convert(lon, lat).unwrap();
            assert!(projected.contains_point(x, y));
        }
    }
}
