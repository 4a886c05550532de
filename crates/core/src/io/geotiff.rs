//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for single-band TIFF I/O with the GeoTIFF
//! georeferencing tags (pixel scale + tiepoint) and the GDAL_NODATA
//! ASCII tag, which is how downstream GIS tools learn the sentinel.

use crate::error::{Error, Result};
use crate::io::temp_sibling;
use crate::raster::{CellValue, GeoTransform, Raster, NODATA_SENTINEL};
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

/// Read a single-band GeoTIFF file into a Raster.
///
/// Pixel values that cannot be represented in `T` become the nodata
/// sentinel. Fails with [`Error::SourceNotFound`] when the file cannot be
/// opened and [`Error::InvalidGeometry`] when the image has zero extent.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: CellValue,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| Error::SourceNotFound {
        path: path.to_path_buf(),
    })?;

    let mut decoder = Decoder::new(file)
        .map_err(|e| Error::InvalidGeometry {
            path: path.to_path_buf(),
            reason: format!("TIFF decode error: {e}"),
        })?;

    let (width, height) = decoder.dimensions().map_err(|e| Error::InvalidGeometry {
        path: path.to_path_buf(),
        reason: format!("cannot read dimensions: {e}"),
    })?;

    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidGeometry {
            path: path.to_path_buf(),
            reason: format!("zero extent ({cols}x{rows})"),
        });
    }

    let result = decoder.read_image().map_err(|e| Error::InvalidGeometry {
        path: path.to_path_buf(),
        reason: format!("cannot read image data: {e}"),
    })?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I8(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }

    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: CellValue,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::nodata))
        .collect()
}

/// Attempt to read a GeoTransform from the TIFF tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("no pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .map_err(|_| Error::Other("no tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("cannot determine geotransform".into()))
}

/// Write a Raster to a GeoTIFF file as 32-bit float.
///
/// The data lands in a temporary sibling file first and is renamed into
/// place, so a crash mid-write never leaves a truncated artifact at the
/// destination path.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: CellValue,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let tmp_path = temp_sibling(path);

    let file = File::create(&tmp_path)?;
    let write_result = encode_geotiff(raster, file);

    match write_result {
        Ok(()) => {
            std::fs::rename(&tmp_path, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: CellValue,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {e}")))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(NODATA_SENTINEL as f32))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("cannot create TIFF image: {e}")))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), scale.as_slice())
        .map_err(|e| Error::Other(format!("cannot write scale tag: {e}")))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("cannot write tiepoint tag: {e}")))?;

    // Minimal GeoKey directory: GTModelTypeGeoKey=1 (Projected),
    // GTRasterTypeGeoKey=1 (RasterPixelIsArea).
    let geokeys: Vec<u16> = vec![
        1, 1, 0, 2, //
        1024, 0, 1, 1, //
        1025, 0, 1, 1, //
    ];
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(|e| Error::Other(format!("cannot write geokey tag: {e}")))?;

    let nodata = format!("{}", NODATA_SENTINEL as i64);
    image
        .encoder()
        .write_tag(Tag::Unknown(TAG_GDAL_NODATA), nodata.as_str())
        .map_err(|e| Error::Other(format!("cannot write nodata tag: {e}")))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("cannot write image data: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.tif");

        let mut raster: Raster<f64> = Raster::filled(3, 4, NODATA_SENTINEL);
        raster.set_transform(GeoTransform::new(500.0, 4200.0, 30.0, -30.0));
        raster.set(1, 2, 12.5).unwrap();

        write_geotiff(&raster, &path).unwrap();
        let back: Raster<f64> = read_geotiff(&path).unwrap();

        assert_eq!(back.shape(), (3, 4));
        assert_relative_eq!(back.get(1, 2).unwrap(), 12.5);
        assert!(back.get(0, 0).unwrap().is_nodata());
        assert!(raster.transform().approx_eq(back.transform()));
    }

    #[test]
    fn test_missing_file() {
        let result: Result<Raster<i32>> = read_geotiff("/no/such/raster.tif");
        assert!(matches!(result, Err(Error::SourceNotFound { .. })));
    }

    #[test]
    fn test_no_partial_artifact_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tif");
        let raster: Raster<f64> = Raster::filled(2, 2, 1.0);

        write_geotiff(&raster, &path).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("out.tif")]);
    }
}
