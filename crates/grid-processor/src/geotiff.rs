//! GeoTIFF encoding and decoding for [`RasterBuffer`].
//!
//! Only what the acquisition pipeline needs is supported: one or three
//! bands, a north-up transform given by tiepoint + pixel scale, and an EPSG
//! code in the GeoKey directory.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use geo_common::{Crs, GeoTransform};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{Gray32Float, Gray8, RGB32Float, RGB8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::ColorType;

use crate::error::{GridProcessorError, Result};
use crate::types::{DataType, RasterBuffer};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

const DECODE_LIMIT_BYTES: usize = 1024 * 1024 * 1024;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Write `raster` as a GeoTIFF at `path`.
///
/// `UInt8` rasters are written as 8-bit samples, everything else as 32-bit
/// float.
pub fn write_geotiff(raster: &RasterBuffer, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_into(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode `raster` as GeoTIFF bytes.
pub fn encode_geotiff(raster: &RasterBuffer) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    encode_into(raster, &mut cursor)?;
    Ok(cursor.into_inner())
}

fn encode_into<W: Write + Seek>(raster: &RasterBuffer, writer: &mut W) -> Result<()> {
    let (width, height) = (raster.width() as u32, raster.height() as u32);
    let mut encoder = TiffEncoder::new(writer)?;
    let pixels = interleave(raster);

    match (raster.bands(), raster.dtype) {
        (1, DataType::UInt8) => {
            let bytes = to_u8(&pixels);
            let mut image = encoder.new_image::<Gray8>(width, height)?;
            write_geo_tags(image.encoder(), raster)?;
            image.write_data(&bytes)?;
        }
        (3, DataType::UInt8) => {
            let bytes = to_u8(&pixels);
            let mut image = encoder.new_image::<RGB8>(width, height)?;
            write_geo_tags(image.encoder(), raster)?;
            image.write_data(&bytes)?;
        }
        (1, _) => {
            let mut image = encoder.new_image::<Gray32Float>(width, height)?;
            write_geo_tags(image.encoder(), raster)?;
            image.write_data(&pixels)?;
        }
        (3, _) => {
            let mut image = encoder.new_image::<RGB32Float>(width, height)?;
            write_geo_tags(image.encoder(), raster)?;
            image.write_data(&pixels)?;
        }
        (n, _) => {
            return Err(GridProcessorError::invalid_raster(format!(
                "GeoTIFF output supports 1 or 3 bands, got {n}"
            )));
        }
    }

    Ok(())
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    raster: &RasterBuffer,
) -> Result<()> {
    let gt = &raster.transform;
    let scale = [gt.pixel_width.abs(), gt.pixel_height.abs(), 0.0];
    dir.write_tag(tag(MODEL_PIXEL_SCALE), scale.as_slice())?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    dir.write_tag(tag(MODEL_TIEPOINT), tiepoint.as_slice())?;

    let geographic = raster.crs.is_geographic();
    let geokeys: [u16; 16] = [
        1,
        1,
        0,
        3,
        GT_MODEL_TYPE_KEY,
        0,
        1,
        if geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
        GT_RASTER_TYPE_KEY,
        0,
        1,
        RASTER_PIXEL_IS_AREA,
        if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        },
        0,
        1,
        raster.crs.epsg(),
    ];
    dir.write_tag(tag(GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    if let Ok(proj) = raster.crs.proj4() {
        let ascii = format!("{proj}|");
        dir.write_tag(tag(GEO_ASCII_PARAMS), ascii.as_str())?;
    }

    if let Some(nodata) = raster.nodata {
        let text = nodata.to_string();
        dir.write_tag(tag(GDAL_NODATA), text.as_str())?;
    }

    Ok(())
}

/// Band-sequential to pixel-interleaved.
fn interleave(raster: &RasterBuffer) -> Vec<f32> {
    let bands = raster.bands();
    if bands == 1 {
        return raster.data().to_vec();
    }
    let n = raster.band_len();
    let mut out = Vec::with_capacity(n * bands);
    for i in 0..n {
        for b in 0..bands {
            out.push(raster.band(b)[i]);
        }
    }
    out
}

fn to_u8(values: &[f32]) -> Vec<u8> {
    values
        .iter()
        .map(|v| if v.is_nan() { 0 } else { v.round().clamp(0.0, 255.0) as u8 })
        .collect()
}

/// Read a GeoTIFF file.
pub fn read_geotiff(path: impl AsRef<Path>) -> Result<RasterBuffer> {
    let file = File::open(path.as_ref())?;
    decode(BufReader::new(file))
}

/// Decode GeoTIFF bytes, e.g. a payload returned by a raster service.
pub fn decode_geotiff(bytes: &[u8]) -> Result<RasterBuffer> {
    decode(Cursor::new(bytes))
}

fn decode<R: Read + Seek>(reader: R) -> Result<RasterBuffer> {
    let mut limits = Limits::default();
    limits.decoding_buffer_size = DECODE_LIMIT_BYTES;
    limits.intermediate_buffer_size = DECODE_LIMIT_BYTES;
    limits.ifd_value_size = DECODE_LIMIT_BYTES;
    let mut decoder = Decoder::new(reader)?.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);
    let bands = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::RGB(_) => 3,
        other => {
            return Err(GridProcessorError::geotiff(format!(
                "unsupported color type {other:?}"
            )));
        }
    };

    let transform = read_transform(&mut decoder)?;
    let crs = read_crs(&mut decoder)?;
    let nodata = decoder
        .get_tag_ascii_string(tag(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse::<f32>().ok());

    let (interleaved, dtype) = match decoder.read_image()? {
        DecodingResult::U8(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::UInt8),
        DecodingResult::U16(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::UInt16),
        DecodingResult::U32(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::UInt32),
        DecodingResult::U64(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::UInt64),
        DecodingResult::I8(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::Int8),
        DecodingResult::I16(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::Int16),
        DecodingResult::I32(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::Int32),
        DecodingResult::I64(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::Int64),
        DecodingResult::F32(d) => (d, DataType::Float32),
        DecodingResult::F64(d) => (d.into_iter().map(|v| v as f32).collect(), DataType::Float64),
    };

    let data = deinterleave(interleaved, bands);
    Ok(RasterBuffer::new(data, width, height, bands, crs, transform)?
        .with_nodata(nodata)
        .with_dtype(dtype))
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let tiepoint = decoder
        .get_tag_f64_vec(tag(MODEL_TIEPOINT))
        .map_err(|_| GridProcessorError::geotiff("missing ModelTiepoint tag"))?;
    let scale = decoder
        .get_tag_f64_vec(tag(MODEL_PIXEL_SCALE))
        .map_err(|_| GridProcessorError::geotiff("missing ModelPixelScale tag"))?;

    if tiepoint.len() < 6 || scale.len() < 2 {
        return Err(GridProcessorError::geotiff("malformed georeferencing tags"));
    }

    // Tiepoint (i, j) -> (x, y); shift back to pixel (0, 0)
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, scale[0], origin_y, -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Crs> {
    let keys = decoder
        .get_tag_u32_vec(tag(GEO_KEY_DIRECTORY))
        .map_err(|_| GridProcessorError::geotiff("missing GeoKeyDirectory tag"))?;

    let mut geographic = None;
    let mut projected = None;
    for entry in keys.get(4..).unwrap_or_default().chunks_exact(4) {
        // Only inline values (location 0) carry an EPSG code
        if entry[1] != 0 {
            continue;
        }
        match entry[0] as u16 {
            GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3]),
            PROJECTED_CS_TYPE_KEY => projected = Some(entry[3]),
            _ => {}
        }
    }

    let code = projected
        .or(geographic)
        .ok_or_else(|| GridProcessorError::geotiff("GeoKeyDirectory has no EPSG code"))?;
    let epsg = u16::try_from(code)
        .map_err(|_| GridProcessorError::geotiff(format!("EPSG code {code} out of range")))?;
    Ok(Crs::from_epsg(epsg)?)
}

fn deinterleave(values: Vec<f32>, bands: usize) -> Vec<f32> {
    if bands == 1 {
        return values;
    }
    let n = values.len() / bands;
    let mut out = vec![0.0; values.len()];
    for (i, pixel) in values.chunks_exact(bands).enumerate() {
        for (b, v) in pixel.iter().enumerate() {
            out[b * n + i] = *v;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn albers(width: usize, height: usize, bands: usize) -> RasterBuffer {
        let data: Vec<f32> = (0..width * height * bands).map(|i| (i % 200) as f32).collect();
        let gt = GeoTransform::new(600_000.0, 30.0, 2_100_000.0, -30.0);
        RasterBuffer::new(data, width, height, bands, Crs::conus_albers(), gt).unwrap()
    }

    #[test]
    fn test_single_band_roundtrip() {
        let raster = albers(7, 5, 1).with_nodata(Some(255.0));
        let bytes = encode_geotiff(&raster).unwrap();
        let back = decode_geotiff(&bytes).unwrap();

        assert_eq!((back.width(), back.height(), back.bands()), (7, 5, 1));
        assert_eq!(back.crs, Crs::conus_albers());
        assert_eq!(back.transform, raster.transform);
        assert_eq!(back.nodata, Some(255.0));
        assert_eq!(back.dtype, DataType::Float32);
        assert_eq!(back.data(), raster.data());
    }

    #[test]
    fn test_three_band_keeps_band_order() {
        let raster = albers(4, 3, 3);
        let back = decode_geotiff(&encode_geotiff(&raster).unwrap()).unwrap();
        assert_eq!(back.bands(), 3);
        for b in 0..3 {
            assert_eq!(back.band(b), raster.band(b));
        }
    }

    #[test]
    fn test_uint8_written_as_bytes() {
        let raster = albers(4, 4, 1).with_dtype(DataType::UInt8);
        let back = decode_geotiff(&encode_geotiff(&raster).unwrap()).unwrap();
        assert_eq!(back.dtype, DataType::UInt8);
        assert_eq!(back.data(), raster.data());
    }

    #[test]
    fn test_geographic_crs_roundtrip() {
        let gt = GeoTransform::new(-87.9, 0.001, 42.0, -0.001);
        let raster = RasterBuffer::filled(3, 3, 1, 1.5, Crs::wgs84(), gt).unwrap();
        let back = decode_geotiff(&encode_geotiff(&raster).unwrap()).unwrap();
        assert_eq!(back.crs, Crs::wgs84());
        assert!((back.transform.origin_x - -87.9).abs() < 1e-12);
        assert_eq!(back.nodata, None);
    }

    #[test]
    fn test_rejects_two_bands() {
        let raster = albers(2, 2, 2);
        assert!(matches!(
            encode_geotiff(&raster),
            Err(GridProcessorError::InvalidRaster(_))
        ));
    }

    #[test]
    fn test_file_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tif");
        let raster = albers(6, 6, 1);

        write_geotiff(&raster, &path).unwrap();
        let back = read_geotiff(&path).unwrap();
        assert_eq!(back.data(), raster.data());

        assert!(matches!(
            read_geotiff(dir.path().join("missing.tif")),
            Err(GridProcessorError::Io(_))
        ));
    }

    #[test]
    fn test_garbage_bytes_are_error() {
        assert!(decode_geotiff(b"not a tiff").is_err());
    }
}
