//! Dataset identifiers and the remote raster expressions behind them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use geo_common::BoundingBox;
use grid_processor::{DataType, RasterBuffer};
use serde::{Deserialize, Serialize};

/// Continental USA, the coverage of the NLCD products.
pub const CONUS_BOUNDS: (f64, f64, f64, f64) = (-125.0, 24.0, -66.5, 49.5);

const NLCD_LANDCOVER: &str = "USGS/NLCD_RELEASES/2019_REL/NLCD/2019";
const NLCD_TREE_CANOPY: &str = "USGS/NLCD_RELEASES/2023_REL/TCC/v2023-5";
const SENTINEL2_SR: &str = "COPERNICUS/S2_SR_HARMONIZED";
const WORLDPOP: &str = "WorldPop/GP/100m/pop";

const TREE_CANOPY_YEARS: std::ops::RangeInclusive<i32> = 2011..=2023;
const TREE_CANOPY_FALLBACK_YEAR: i32 = 2021;
const LANDCOVER_YEAR: i32 = 2019;

/// Nodata value of acquired rasters. Unfetched tiles stay at this value.
pub const ACQUIRED_NODATA: f32 = 0.0;

/// Sample type and nodata value every raster of a dataset carries, whether
/// it came back in one request or was stitched from tiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputLayout {
    pub dtype: DataType,
    pub nodata: f32,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            dtype: DataType::Float32,
            nodata: ACQUIRED_NODATA,
        }
    }
}

impl OutputLayout {
    /// Rewrite `raster` onto this layout. NaN pixels and pixels equal to the
    /// raster's own nodata become `self.nodata`.
    pub fn conform(&self, mut raster: RasterBuffer) -> RasterBuffer {
        let source_nodata = raster.nodata;
        for v in raster.data_mut() {
            if v.is_nan() || source_nodata == Some(*v) {
                *v = self.nodata;
            }
        }
        raster.with_nodata(Some(self.nodata)).with_dtype(self.dtype)
    }
}

/// Datasets a job can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    LandCover,
    TreeCover,
    Ndvi,
    Population,
    Basemap,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 5] = [
        Self::LandCover,
        Self::TreeCover,
        Self::Ndvi,
        Self::Population,
        Self::Basemap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LandCover => "land_cover",
            Self::TreeCover => "tree_cover",
            Self::Ndvi => "ndvi",
            Self::Population => "population",
            Self::Basemap => "basemap",
        }
    }

    /// Parse a dataset identifier. Returns `None` for unknown ids.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "land_cover" => Some(Self::LandCover),
            "tree_cover" => Some(Self::TreeCover),
            "ndvi" => Some(Self::Ndvi),
            "population" => Some(Self::Population),
            "basemap" => Some(Self::Basemap),
            _ => None,
        }
    }

    /// Human-readable source name recorded in the manifest.
    pub fn source_name(&self) -> &'static str {
        match self {
            Self::LandCover => "NLCD Land Cover",
            Self::TreeCover => "NLCD Tree Canopy",
            Self::Ndvi => "Sentinel-2 NDVI",
            Self::Population => "WorldPop Population",
            Self::Basemap => "Sentinel-2 True Color",
        }
    }

    /// Native resolution in meters per pixel.
    pub fn native_scale(&self) -> f64 {
        match self {
            Self::Population => 100.0,
            _ => 30.0,
        }
    }

    /// Categorical and imagery products are 8-bit; continuous ones float.
    pub fn layout(&self) -> OutputLayout {
        let dtype = match self {
            Self::LandCover | Self::TreeCover | Self::Basemap => DataType::UInt8,
            Self::Ndvi | Self::Population => DataType::Float32,
        };
        OutputLayout {
            dtype,
            nodata: ACQUIRED_NODATA,
        }
    }

    /// Whether the product only exists over the continental USA.
    pub fn conus_only(&self) -> bool {
        matches!(self, Self::LandCover | Self::TreeCover)
    }

    /// Whether the product has data for `bbox`.
    pub fn covers(&self, bbox: &BoundingBox) -> bool {
        if !self.conus_only() {
            return true;
        }
        let (min_lon, min_lat, max_lon, max_lat) = CONUS_BOUNDS;
        BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
            .map(|conus| conus.intersects(bbox))
            .unwrap_or(false)
    }

    /// The product year actually used for a requested `year`.
    pub fn resolve_year(&self, year: i32) -> i32 {
        match self {
            Self::LandCover => LANDCOVER_YEAR,
            Self::TreeCover if TREE_CANOPY_YEARS.contains(&year) => year,
            Self::TreeCover => TREE_CANOPY_FALLBACK_YEAR,
            _ => year,
        }
    }

    /// Remote expressions to evaluate, one per output band.
    pub fn sources(&self, year: i32) -> Vec<RasterSource> {
        let year = self.resolve_year(year);
        match self {
            Self::LandCover => vec![RasterSource::image(NLCD_LANDCOVER, "landcover")],
            Self::TreeCover => vec![RasterSource::collection(
                NLCD_TREE_CANOPY,
                "NLCD_Percent_Tree_Canopy_Cover",
            )
            .filter(SourceFilter::Equals {
                property: "year".to_string(),
                value: serde_json::Value::from(year),
            })
            .composite(Composite::First)],
            Self::Ndvi => vec![summer_sentinel2(year, "ndvi")
                .expression(BandExpression::NormalizedDifference {
                    first: "B8".to_string(),
                    second: "B4".to_string(),
                })],
            Self::Population => vec![RasterSource::collection(WORLDPOP, "population")
                .filter(SourceFilter::Equals {
                    property: "year".to_string(),
                    value: serde_json::Value::from(year),
                })
                .composite(Composite::Mosaic)],
            Self::Basemap => ["B4", "B3", "B2"]
                .into_iter()
                .map(|band| summer_sentinel2(year, band))
                .collect(),
        }
    }
}

fn summer_sentinel2(year: i32, band: &str) -> RasterSource {
    let mut source = RasterSource::collection(SENTINEL2_SR, band)
        .filter(SourceFilter::LessThan {
            property: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
            value: 20.0,
        })
        .composite(Composite::Median);
    if let (Some(start), Some(end)) = (
        NaiveDate::from_ymd_opt(year, 6, 1),
        NaiveDate::from_ymd_opt(year, 8, 31),
    ) {
        source = source.filter(SourceFilter::DateRange { start, end });
    }
    source
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown dataset '{s}'"))
    }
}

/// Whether an asset is a single image or a collection to filter/composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Image,
    Collection,
}

/// Property filter applied to a collection before compositing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SourceFilter {
    Equals {
        property: String,
        value: serde_json::Value,
    },
    LessThan {
        property: String,
        value: f64,
    },
    DateRange {
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// How a filtered collection is reduced to one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Composite {
    First,
    Median,
    Mosaic,
}

/// Band math evaluated remotely after compositing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BandExpression {
    /// `(first - second) / (first + second)`
    NormalizedDifference { first: String, second: String },
}

/// A remote-evaluable raster expression yielding a single band.
///
/// Stateless and reusable across regions; the region and grid are supplied
/// per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSource {
    pub asset: String,
    pub kind: AssetKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<SourceFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite: Option<Composite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<BandExpression>,
    /// Band selected from the (composited) image, or the name given to the
    /// expression result.
    pub band: String,
}

impl RasterSource {
    pub fn image(asset: impl Into<String>, band: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            kind: AssetKind::Image,
            filters: Vec::new(),
            composite: None,
            expression: None,
            band: band.into(),
        }
    }

    pub fn collection(asset: impl Into<String>, band: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Collection,
            ..Self::image(asset, band)
        }
    }

    pub fn filter(mut self, filter: SourceFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn composite(mut self, composite: Composite) -> Self {
        self.composite = Some(composite);
        self
    }

    pub fn expression(mut self, expression: BandExpression) -> Self {
        self.expression = Some(expression);
        self
    }
}

impl fmt::Display for RasterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset, self.band)
    }
}
