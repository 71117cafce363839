//! HTTP-level tests against the full router.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
};
use common::{inside_tile, off_by_one_zoom_tile, state};
use serde_json::Value;
use std::sync::Arc;
use tile_api::build_router;
use tile_api::state::AppState;
use tower::ServiceExt;

async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
    build_router(Arc::clone(state)).oneshot(request).await.unwrap()
}

async fn get(state: &Arc<AppState>, uri: &str) -> Response {
    send(state, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn tile_path(prefix: &str, dataset: &str) -> String {
    let t = inside_tile();
    format!("/{}/{}/{}/{}/{}", prefix, dataset, t.z, t.x, t.y)
}

fn content_type(response: &Response) -> &str {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

// ============================================================================
// Catalogue
// ============================================================================

#[tokio::test]
async fn test_list_indices() {
    let state = state();
    let response = get(&state, "/index/list").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["count"], 10);
    assert_eq!(body["data"]["indices"][0]["code"], "NDVI");
}

#[tokio::test]
async fn test_index_info() {
    let state = state();
    let body = json_body(get(&state, "/index/info/ndvi").await).await;
    assert_eq!(body["data"]["code"], "NDVI");
    assert_eq!(body["data"]["equation"], "(nir - red) / (nir + red)");

    let response = get(&state, "/index/info/FOO").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["error"], "UnknownIndex");
}

#[tokio::test]
async fn test_list_colormaps() {
    let state = state();
    let body = json_body(get(&state, "/index/colormaps").await).await;
    assert_eq!(body["data"]["count"], 11);
    assert_eq!(body["data"]["colormaps"][0], "viridis");
}

// ============================================================================
// Index tiles
// ============================================================================

#[tokio::test]
async fn test_index_tile_png() {
    let state = state();
    let uri = format!("{}?indexName=NDVI&rescale=0,1", tile_path("index", "field"));
    let response = get(&state, &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");
    assert!(response.headers().get("x-zoom-corrected").is_none());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_default_dataset_route() {
    let state = state();
    let t = inside_tile();
    let uri = format!("/index/{}/{}/{}?equation=b4-b1", t.z, t.x, t.y);
    let response = get(&state, &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");
    assert_eq!(state.cache.resident_count().await, 1);
}

#[tokio::test]
async fn test_missing_formula() {
    let state = state();
    let response = get(&state, &tile_path("index", "field")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["error"], "MissingFormulaOrIndex");
    assert_eq!(body["error"]["statusCode"], 400);
    assert_eq!(body["error"]["details"]["availableIndices"][0], "NDVI");
    // Rejected before the dataset is opened
    assert_eq!(state.cache.resident_count().await, 0);
}

#[tokio::test]
async fn test_invalid_coordinates() {
    let state = state();
    for uri in [
        "/index/field/12/4096/0?indexName=NDVI",
        "/index/field/abc/1/1?indexName=NDVI",
        "/tile/field/30/0/0",
    ] {
        let response = get(&state, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        let body = json_body(response).await;
        assert_eq!(body["error"]["error"], "InvalidTileCoordinate");
        assert_eq!(body["error"]["details"]["zoomRange"][1], 22);
    }
}

#[tokio::test]
async fn test_unknown_dataset() {
    let state = state();
    let uri = format!("{}?indexName=NDVI", tile_path("index", "nowhere"));
    let response = get(&state, &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["error"], "DatasetNotFound");
}

#[tokio::test]
async fn test_expression_errors() {
    let state = state();
    let uri = format!("{}?equation=b1%20%2B", tile_path("index", "field"));
    let response = get(&state, &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["error"], "ExpressionSyntaxError");

    let uri = format!("{}?indexName=NDVI", tile_path("index", "rgb"));
    let response = get(&state, &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["error"], "UnresolvedBandAlias");
    assert_eq!(body["error"]["details"]["availableBands"][0], "Red");
}

#[tokio::test]
async fn test_format_selection() {
    let state = state();
    let uri = format!("{}?format=webp&quality=70", tile_path("tile", "rgb"));
    let response = get(&state, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/webp");

    let t = inside_tile();
    let uri = format!("/vari/rgb/{}/{}/{}.jpg", t.z, t.x, t.y);
    let response = get(&state, &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/jpeg");
}

#[tokio::test]
async fn test_zoom_corrected_header() {
    let state = state();
    let t = off_by_one_zoom_tile();
    let uri = format!("/tile/rgb/{}/{}/{}", t.z, t.x, t.y);
    let response = get(&state, &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    let label = response
        .headers()
        .get("x-zoom-corrected")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(label.starts_with(&format!("{}->{}/", t, t.z - 1)));
}

// ============================================================================
// Datasets
// ============================================================================

#[tokio::test]
async fn test_load_list_and_evict() {
    let state = state();
    let request = Request::post("/datasets/load")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"idOrPath": "field"}"#))
        .unwrap();
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["id"], "field");
    assert_eq!(body["data"]["bandCount"], 4);
    assert_eq!(body["data"]["bandNames"][3], "NIR");

    let body = json_body(get(&state, "/datasets/loaded").await).await;
    assert_eq!(body["data"]["count"], 1);

    let evict = || Request::delete("/datasets/field").body(Body::empty()).unwrap();
    assert_eq!(send(&state, evict()).await.status(), StatusCode::OK);
    assert_eq!(send(&state, evict()).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(state.cache.resident_count().await, 0);
}

#[tokio::test]
async fn test_list_available_datasets() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.tif"), b"").unwrap();
    std::fs::write(dir.path().join("a.TIFF"), b"").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

    let mut config = common::config();
    config.data_dir = dir.path().to_path_buf();
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let state = Arc::new(AppState::with_opener(
        config,
        Arc::new(common::FixtureOpener),
        handle,
    ));

    let body = json_body(get(&state, "/datasets").await).await;
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["datasets"][0], "a.TIFF");
    assert_eq!(body["data"]["defaultDataset"], "field.tif");
}

// ============================================================================
// Health and metrics
// ============================================================================

#[tokio::test]
async fn test_health_and_metrics() {
    let state = state();
    get(&state, &format!("{}?indexName=NDVI", tile_path("index", "field"))).await;

    let body = json_body(get(&state, "/health").await).await;
    assert_eq!(body["data"]["healthy"], true);
    assert_eq!(body["data"]["residentDatasets"], 1);
    assert_eq!(body["data"]["datasetCache"]["opens"], 1);
    assert_eq!(body["data"]["colormapTables"], 1);

    let response = get(&state, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("text/plain"));
}
