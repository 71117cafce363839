//! Index tiles rendered from GeoTIFF files on disk.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use common::inside_tile;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tile_api::build_router;
use tile_api::rendering::{IndexTileRequest, PreparedFormula, RenderOptions};
use tile_api::state::AppState;
use tile_common::CrsCode;
use tower::ServiceExt;

const SIZE: u32 = 200;

/// Per-pixel samples in file order: Blue, Green, Red, Near Infrared.
const PIXEL: [u8; 4] = [10, 40, 20, 100];

const BAND_XML: &str = r#"<GDALMetadata>
  <Item name="DESCRIPTION" sample="0" role="description">Blue</Item>
  <Item name="DESCRIPTION" sample="1" role="description">Green</Item>
  <Item name="DESCRIPTION" sample="2" role="description">Red</Item>
  <Item name="DESCRIPTION" sample="3" role="description">Near Infrared</Item>
</GDALMetadata>"#;

/// Four-band WGS84 scene covering lon 10..11, lat 45..46.
fn write_multiband_geotiff(path: &Path) {
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder.new_image::<colortype::RGBA8>(SIZE, SIZE).unwrap();

    let scale = [0.005f64, 0.005, 0.0];
    let tiepoint = [0.0f64, 0.0, 0.0, 10.0, 46.0, 0.0];
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326];
    let encoder = image.encoder();
    encoder.write_tag(Tag::from_u16_exhaustive(33550), &scale[..]).unwrap();
    encoder.write_tag(Tag::from_u16_exhaustive(33922), &tiepoint[..]).unwrap();
    encoder.write_tag(Tag::from_u16_exhaustive(34735), &geokeys[..]).unwrap();
    encoder.write_tag(Tag::from_u16_exhaustive(42112), BAND_XML).unwrap();

    let data: Vec<u8> = PIXEL.iter().copied().cycle().take((SIZE * SIZE * 4) as usize).collect();
    image.write_data(&data).unwrap();
}

fn state_over(dir: &Path) -> Arc<AppState> {
    let mut config = common::config();
    config.data_dir = dir.to_path_buf();
    config.default_dataset = "scene.tif".to_string();
    let handle = PrometheusBuilder::new().build_recorder().handle();
    Arc::new(AppState::new(config, handle))
}

#[tokio::test]
async fn test_band_names_and_aliases_from_file() {
    let dir = tempfile::tempdir().unwrap();
    write_multiband_geotiff(&dir.path().join("scene.tif"));
    let state = state_over(dir.path());

    let entry = state.cache.get_or_open("scene").await.unwrap();
    assert_eq!((entry.width, entry.height), (200, 200));
    assert_eq!(entry.crs(), CrsCode::Geographic(4326));
    assert_eq!(
        entry.bands.band_names(),
        vec!["Blue", "Green", "Red", "Near Infrared"]
    );
    assert_eq!(entry.bands.index_of("nir"), Some(3));
    assert_eq!(entry.bands.index_of("near_infrared"), Some(3));
    assert_eq!(entry.bands.index_of("red"), Some(2));
    assert_eq!(entry.bands.index_of("green"), Some(1));
    assert_eq!(entry.bands.index_of("blue"), Some(0));
    assert_eq!(entry.bands.index_of("b4"), Some(3));

    let bounds = entry.geographic_bounds;
    assert!((bounds.min_x - 10.0).abs() < 1e-9);
    assert!((bounds.max_x - 11.0).abs() < 1e-9);
    assert!((bounds.min_y - 45.0).abs() < 1e-9);
    assert!((bounds.max_y - 46.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_ndvi_tile_from_file() {
    let dir = tempfile::tempdir().unwrap();
    write_multiband_geotiff(&dir.path().join("scene.tif"));
    let state = state_over(dir.path());

    let entry = state.cache.get_or_open("default").await.unwrap();
    let formula = PreparedFormula::from_params(None, Some("NDVI")).unwrap();
    let request = IndexTileRequest::new(formula, Some("rdylgn"), Default::default());
    let tile = state
        .renderer
        .render_index(&entry, inside_tile(), &request, RenderOptions::png(256))
        .await
        .unwrap();

    assert!(tile.has_coverage());
    // (100 - 20) / (100 + 20)
    let stats = tile.stats.unwrap();
    assert!((stats.mean - 80.0 / 120.0).abs() < 1e-6);
    assert!((stats.min - stats.max).abs() < 1e-9);
}

#[tokio::test]
async fn test_ndvi_tile_over_http_from_file() {
    let dir = tempfile::tempdir().unwrap();
    write_multiband_geotiff(&dir.path().join("scene.tif"));
    let state = state_over(dir.path());

    let t = inside_tile();
    let uri = format!("/index/scene/{}/{}/{}?indexName=NDVI", t.z, t.x, t.y);
    let response = build_router(Arc::clone(&state))
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
    assert_eq!(state.cache.stats().opens.load(Ordering::Relaxed), 1);
}
