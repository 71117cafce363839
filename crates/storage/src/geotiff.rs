//! GeoTIFF reading with the `tiff` crate.
//!
//! The whole image is decoded once at open time into per-band `f32`
//! planes; window reads are then plain slicing. Only the GeoTIFF tags the
//! tile pipeline needs are interpreted: pixel scale plus tiepoint (or the
//! model transformation matrix), the CRS GeoKeys, and GDAL's metadata and
//! nodata tags.

use crate::raster::{InMemoryRaster, RasterError, RasterOpener, RasterSource};
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tile_common::{CrsCode, GeoTransform};
use tracing::{debug, info, warn};

pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GDAL_METADATA: u16 = 42112;
pub const TAG_GDAL_NODATA: u16 = 42113;

/// The decoder stores known codes under named variants, so lookups must go
/// through the exhaustive mapping rather than `Tag::Unknown`.
fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

const KEY_GEOGRAPHIC_TYPE: u32 = 2048;
const KEY_PROJECTED_CS_TYPE: u32 = 3072;
const KEY_USER_DEFINED: u32 = 32767;

/// Opens `.tif` files from disk on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoTiffOpener;

#[async_trait]
impl RasterOpener for GeoTiffOpener {
    async fn open(&self, path: &Path) -> Result<Arc<dyn RasterSource>, RasterError> {
        let path = path.to_path_buf();
        let raster = tokio::task::spawn_blocking(move || read_geotiff(&path))
            .await
            .map_err(|e| RasterError::Join(e.to_string()))??;
        Ok(Arc::new(raster))
    }
}

/// Read and fully decode a GeoTIFF file.
pub fn read_geotiff(path: &Path) -> Result<InMemoryRaster, RasterError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RasterError::NotFound(path.to_path_buf()),
        _ => RasterError::Io(e),
    })?;
    let started = std::time::Instant::now();
    let raster = decode_geotiff(BufReader::new(file), path)?;
    info!(
        path = %path.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Decoded GeoTIFF"
    );
    Ok(raster)
}

/// Decode a GeoTIFF from any seekable reader. `path` is only used in errors.
pub fn decode_geotiff<R: Read + Seek>(reader: R, path: &Path) -> Result<InMemoryRaster, RasterError> {
    let decode_err = |e: tiff::TiffError| RasterError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut decoder = Decoder::new(reader)
        .map_err(decode_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(decode_err)?;
    let (width, height) = (width as usize, height as usize);
    let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1).max(1) as usize;
    let planar = decoder.get_tag_u32(Tag::PlanarConfiguration).unwrap_or(1);

    let transform = read_transform(&mut decoder, path)?;
    let gdal_metadata = decoder
        .get_tag_ascii_string(geo_tag(TAG_GDAL_METADATA))
        .ok();
    let nodata = decoder
        .get_tag_ascii_string(geo_tag(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok());

    let data = samples_to_f32(decoder.read_image().map_err(decode_err)?);
    let pixels = width * height;
    if data.len() < pixels * samples {
        return Err(RasterError::Decode {
            path: path.to_path_buf(),
            message: format!(
                "expected {} samples for {}x{}x{}, got {}",
                pixels * samples,
                width,
                height,
                samples,
                data.len()
            ),
        });
    }

    let planes = if planar == 2 {
        data.chunks_exact(pixels).take(samples).map(<[f32]>::to_vec).collect()
    } else {
        deinterleave(&data, samples, pixels)
    };

    debug!(
        path = %path.display(),
        width,
        height,
        bands = samples,
        crs = %transform.crs,
        "GeoTIFF header"
    );

    let mut raster = InMemoryRaster::new(width, height, transform, planes)?;
    if let Some(xml) = gdal_metadata {
        raster = raster.with_gdal_metadata(xml);
    }
    if let Some(nodata) = nodata {
        raster = raster.with_nodata(nodata);
    }
    Ok(raster)
}

fn samples_to_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f32::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.into_iter().map(|v| v as f32).collect(),
        // Caught by the sample count check in the caller
        #[allow(unreachable_patterns)]
        _ => Vec::new(),
    }
}

/// Split pixel-interleaved samples into one plane per band.
fn deinterleave(data: &[f32], samples: usize, pixels: usize) -> Vec<Vec<f32>> {
    if samples == 1 {
        return vec![data[..pixels].to_vec()];
    }
    let mut planes = vec![Vec::with_capacity(pixels); samples];
    for px in data.chunks_exact(samples).take(pixels) {
        for (plane, value) in planes.iter_mut().zip(px) {
            plane.push(*value);
        }
    }
    planes
}

fn read_transform<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoTransform, RasterError> {
    let crs = read_crs(decoder, path);

    let scale = decoder.get_tag_f64_vec(geo_tag(TAG_MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(TAG_MODEL_TIEPOINT)).ok();
    if let (Some(scale), Some(tie)) = (scale, tiepoint) {
        if scale.len() >= 2 && tie.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z] maps raster (I, J) to model (X, Y)
            let origin_x = tie[3] - tie[0] * scale[0];
            let origin_y = tie[4] + tie[1] * scale[1];
            return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1], crs));
        }
    }

    if let Ok(m) = decoder.get_tag_f64_vec(geo_tag(TAG_MODEL_TRANSFORMATION)) {
        if m.len() >= 16 {
            if m[1] != 0.0 || m[4] != 0.0 {
                warn!(path = %path.display(), "Rotated model transformation, ignoring rotation terms");
            }
            return Ok(GeoTransform::new(m[3], m[7], m[0], m[5], crs));
        }
    }

    Err(RasterError::MissingGeoreference(path.to_path_buf()))
}

/// CRS from the GeoKey directory; WGS84 when it cannot be determined.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> CrsCode {
    let keys = match decoder.get_tag_u32_vec(geo_tag(TAG_GEO_KEY_DIRECTORY)) {
        Ok(keys) => keys,
        Err(_) => {
            warn!(path = %path.display(), "No GeoKey directory, assuming EPSG:4326");
            return CrsCode::wgs84();
        }
    };

    match crs_from_geokeys(&keys) {
        Some(crs) => crs,
        None => {
            warn!(path = %path.display(), "GeoKeys carry no EPSG code, assuming EPSG:4326");
            CrsCode::wgs84()
        }
    }
}

/// Find the projected or geographic EPSG code in a raw GeoKey directory.
///
/// The directory is a 4-value header followed by `(key, location, count,
/// value)` entries; only inline values (location 0) are considered.
pub fn crs_from_geokeys(keys: &[u32]) -> Option<CrsCode> {
    let count = *keys.get(3)? as usize;
    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == KEY_USER_DEFINED || value == 0 {
            continue;
        }
        match key {
            KEY_PROJECTED_CS_TYPE => projected = Some(CrsCode::Projected(value)),
            KEY_GEOGRAPHIC_TYPE => geographic = Some(CrsCode::Geographic(value)),
            _ => {}
        }
    }
    projected.or(geographic)
}

/// Resolve a dataset path the way ids are accepted over HTTP: absolute paths
/// are used as-is, `.tif`/`.tiff` names are joined to `data_dir`, anything
/// else gets `.tif` appended.
///
/// Relative ids may only name files below `data_dir`; `None` for ids with
/// `..` or other non-plain components.
pub fn resolve_dataset_path(data_dir: &Path, id_or_path: &str) -> Option<PathBuf> {
    let candidate = Path::new(id_or_path);
    if candidate.is_absolute() {
        return Some(candidate.to_path_buf());
    }
    let plain = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !plain || id_or_path.is_empty() {
        return None;
    }
    if has_tiff_extension(candidate) {
        Some(data_dir.join(candidate))
    } else {
        Some(data_dir.join(format!("{}.tif", id_or_path)))
    }
}

pub fn has_tiff_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

/// File names of the GeoTIFFs directly under `data_dir`, sorted.
pub async fn list_available(data_dir: &Path) -> Result<Vec<String>, RasterError> {
    let mut entries = match tokio::fs::read_dir(data_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %data_dir.display(), "Data directory does not exist");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if has_tiff_extension(&path) && entry.file_type().await?.is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype, TiffEncoder};
    use tile_common::PixelWindow;

    fn write_rgb_geotiff(path: &Path, width: u32, height: u32) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder.new_image::<colortype::RGB8>(width, height).unwrap();

        let scale = [0.5f64, 0.5, 0.0];
        let tiepoint = [0.0f64, 0.0, 0.0, 500_000.0, 4_000_000.0, 0.0];
        let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32633];
        let xml = "<GDALMetadata><Item name=\"DESCRIPTION\" sample=\"0\" role=\"description\">Red</Item></GDALMetadata>";
        image.encoder().write_tag(geo_tag(TAG_MODEL_PIXEL_SCALE), &scale[..]).unwrap();
        image.encoder().write_tag(geo_tag(TAG_MODEL_TIEPOINT), &tiepoint[..]).unwrap();
        image.encoder().write_tag(geo_tag(TAG_GEO_KEY_DIRECTORY), &geokeys[..]).unwrap();
        image.encoder().write_tag(geo_tag(TAG_GDAL_METADATA), xml).unwrap();
        image.encoder().write_tag(geo_tag(TAG_GDAL_NODATA), "255").unwrap();

        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for i in 0..(width * height) {
            data.extend_from_slice(&[(i % 256) as u8, 100, 200]);
        }
        image.write_data(&data).unwrap();
    }

    #[tokio::test]
    async fn test_geotiff_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.tif");
        write_rgb_geotiff(&path, 8, 4);

        let raster = GeoTiffOpener.open(&path).await.unwrap();
        let info = raster.info();
        assert_eq!((info.width, info.height, info.band_count), (8, 4, 3));
        assert_eq!(info.transform.crs, CrsCode::Projected(32633));
        assert_eq!(info.transform.origin_x, 500_000.0);
        assert_eq!(info.transform.pixel_height, -0.5);
        assert!(info.gdal_metadata.as_deref().unwrap_or("").contains("Red"));
        assert_eq!(info.nodata, Some(255.0));

        let window = raster
            .read_window(PixelWindow::new(2, 1, 4, 2), &[0, 2])
            .await
            .unwrap();
        assert_eq!(window.bands[0], vec![10.0, 11.0]);
        assert_eq!(window.bands[1], vec![200.0, 200.0]);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = GeoTiffOpener
            .open(&dir.path().join("missing.tif"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RasterError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_available_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.tif", "a.TIFF", "notes.txt", "c.tif.aux.xml"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names = list_available(dir.path()).await.unwrap();
        assert_eq!(names, vec!["a.TIFF", "b.tif"]);
    }

    #[test]
    fn test_geokeys() {
        let geographic = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326];
        assert_eq!(crs_from_geokeys(&geographic), Some(CrsCode::Geographic(4326)));
        let both = [1, 1, 0, 2, 2048, 0, 1, 4326, 3072, 0, 1, 3857];
        assert_eq!(crs_from_geokeys(&both), Some(CrsCode::Projected(3857)));
        let user_defined = [1, 1, 0, 1, 3072, 0, 1, 32767];
        assert_eq!(crs_from_geokeys(&user_defined), None);
        assert_eq!(crs_from_geokeys(&[1, 1]), None);
    }

    #[test]
    fn test_resolve_dataset_path() {
        let dir = Path::new("/srv/data");
        let resolve = |id: &str| resolve_dataset_path(dir, id);
        assert_eq!(resolve("/abs/scene.tif"), Some(PathBuf::from("/abs/scene.tif")));
        assert_eq!(resolve("ortho.tiff"), Some(PathBuf::from("/srv/data/ortho.tiff")));
        assert_eq!(resolve("farm_2024"), Some(PathBuf::from("/srv/data/farm_2024.tif")));
        assert_eq!(resolve("2024/farm.tif"), Some(PathBuf::from("/srv/data/2024/farm.tif")));
    }

    #[test]
    fn test_resolve_rejects_escaping_ids() {
        let dir = Path::new("/srv/data");
        assert_eq!(resolve_dataset_path(dir, "../etc/passwd"), None);
        assert_eq!(resolve_dataset_path(dir, "a/../../b.tif"), None);
        assert_eq!(resolve_dataset_path(dir, "./scene"), None);
        assert_eq!(resolve_dataset_path(dir, ""), None);
    }

    #[test]
    fn test_deinterleave() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(deinterleave(&data, 3, 2), vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]);
    }
}
