//! End-to-end search tests.
//!
//! The geocoder and solar provider are in-process fakes; flux rasters are
//! served by a local axum server standing in for the image proxy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use renderer::{IntensityBand, MapView, MemoryMapView, SearchState};
use solar_analyzer::{AnalyzerConfig, SearchInput, SearchPipeline};
use solar_client::{DataLayerRequest, GeocodedAddress, Geocoder, SolarProvider};
use solar_common::{BuildingInsights, DataLayers, LatLng, SolarError, SolarResult, Viewport};
use test_utils::fixtures::{self, anchors};
use test_utils::{create_flux_grid, encode_test_geotiff, spawn_server, TestGeoTiff};

const FLUX_URL: &str = "https://solar.googleapis.com/v1/geoTiff:get?id=flux";
const MISSING_URL: &str = "https://solar.googleapis.com/v1/geoTiff:get?id=missing";
const UTM_URL: &str = "https://solar.googleapis.com/v1/geoTiff:get?id=utm";

fn tampa() -> LatLng {
    LatLng::new(anchors::TAMPA.0, anchors::TAMPA.1)
}

// ============================================================================
// Fakes
// ============================================================================

struct FakeGeocoder;

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> SolarResult<GeocodedAddress> {
        if address == "nowhere" {
            return Err(SolarError::GeocodeNotFound(address.to_string()));
        }
        Ok(GeocodedAddress {
            location: tampa(),
            formatted_address: Some("100 N Tampa St, Tampa, FL 33602, USA".to_string()),
        })
    }
}

#[derive(Default)]
struct FakeProvider {
    insights: Option<String>,
    layers: Option<String>,
    /// Delay applied to the first data layer call only
    first_call_delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn new(insights: Option<String>, layers: Option<String>) -> Self {
        Self {
            insights,
            layers,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SolarProvider for FakeProvider {
    async fn building_insights(&self, _location: LatLng) -> SolarResult<BuildingInsights> {
        match &self.insights {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Err(SolarError::NoSolarData),
        }
    }

    async fn data_layers(&self, _location: LatLng, _request: &DataLayerRequest) -> SolarResult<DataLayers> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(delay) = self.first_call_delay {
                tokio::time::sleep(delay).await;
            }
        }
        match &self.layers {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(DataLayers::default()),
        }
    }
}

/// Target URLs the proxy was asked for.
type ProxyLog = Arc<Mutex<Vec<String>>>;

async fn proxy_handler(State(log): State<ProxyLog>, Query(params): Query<HashMap<String, String>>) -> Response {
    let Some(target) = params.get("url") else {
        return (StatusCode::BAD_REQUEST, r#"{"error":"Missing url parameter"}"#).into_response();
    };
    log.lock().unwrap().push(target.clone());

    let (lat, lng) = anchors::TAMPA;
    let tiff = if target.contains("id=flux") {
        TestGeoTiff::geographic(10, 10, create_flux_grid(10, 10), lat + 0.0005, lng - 0.0005, 0.0001)
    } else if target.contains("id=utm") {
        let (e, n) = anchors::TAMPA_UTM_17N;
        TestGeoTiff::utm(10, 10, create_flux_grid(10, 10), 32617, e - 5.0, n + 5.0, 1.0)
    } else {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"error":"Upstream request failed","details":"Requested entity was not found.","status":404}"#,
        )
            .into_response();
    };
    ([(header::CONTENT_TYPE, "image/tiff")], encode_test_geotiff(&tiff)).into_response()
}

async fn spawn_proxy() -> (String, ProxyLog) {
    let log: ProxyLog = Arc::default();
    let router = Router::new()
        .route("/api/geotiff-proxy", get(proxy_handler))
        .with_state(log.clone());
    let addr = spawn_server(router).await;
    (format!("http://{}", addr), log)
}

fn config(proxy_base_url: &str) -> AnalyzerConfig {
    AnalyzerConfig {
        api_key: "test-key".to_string(),
        proxy_base_url: proxy_base_url.to_string(),
        viewport: Viewport::new(64, 64),
        ..AnalyzerConfig::default()
    }
}

async fn pipeline_with<V: MapView>(provider: FakeProvider, view: V) -> (SearchPipeline<V>, ProxyLog) {
    let (base, log) = spawn_proxy().await;
    let pipeline = SearchPipeline::new(&config(&base), Arc::new(FakeGeocoder), Arc::new(provider), view).unwrap();
    (pipeline, log)
}

fn layers_near_tampa(flux_url: &str) -> Option<String> {
    let (lat, lng) = anchors::TAMPA;
    Some(fixtures::data_layers_json(
        flux_url,
        Some((lat - 0.0005, lng - 0.0005, lat + 0.0005, lng + 0.0005)),
    ))
}

// ============================================================================
// Flux image path
// ============================================================================

#[tokio::test]
async fn test_address_search_attaches_flux_image() {
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(Some(1800.0))), layers_near_tampa(FLUX_URL));
    let (pipeline, log) = pipeline_with(provider, MemoryMapView::new()).await;

    let report = pipeline
        .search(SearchInput::Address("100 N Tampa St".to_string()))
        .await
        .unwrap();

    assert_eq!(report.overlay_kind, Some("flux_image"));
    assert!(!report.stale);
    assert!(report.fallback_reason.is_none());
    assert_eq!(
        report.trail,
        vec![
            SearchState::Idle,
            SearchState::Fetching,
            SearchState::Decoding,
            SearchState::Rendering,
            SearchState::Attached,
        ]
    );
    assert!(report.bounds.unwrap().strictly_contains(&tampa()));
    assert_eq!(
        report.formatted_address.as_deref(),
        Some("100 N Tampa St, Tampa, FL 33602, USA")
    );

    let summary = report.summary.unwrap();
    assert_eq!(summary.max_panels, Some(32));
    assert_eq!(summary.configurations.len(), 3);

    // Flux URL went through the proxy with the key appended
    let requested = log.lock().unwrap().clone();
    assert_eq!(requested, vec![format!("{}&key=test-key", FLUX_URL)]);

    let session = pipeline.into_session();
    let view = session.view();
    assert_eq!(view.attached_count(), 1);
    let image = view.overlays().next().unwrap().image().unwrap().clone();
    assert_eq!((image.width, image.height), (64, 64));
}

#[tokio::test]
async fn test_embedded_utm_bounds_used_without_provider_bounds() {
    let layers = Some(fixtures::data_layers_json(UTM_URL, None));
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(None)), layers);
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::new()).await;

    let report = pipeline.search(SearchInput::Location(tampa())).await.unwrap();

    assert_eq!(report.overlay_kind, Some("flux_image"));
    let bounds = report.bounds.unwrap();
    assert!(bounds.strictly_contains(&tampa()));
    // 10 m square raster, padded by the safety margin at most
    assert!(bounds.height_deg() < 0.001);
}

#[tokio::test]
async fn test_far_provider_bounds_are_repaired() {
    // Bounds roughly 1 km north of the anchor
    let (lat, lng) = anchors::TAMPA;
    let layers = Some(fixtures::data_layers_json(
        FLUX_URL,
        Some((lat + 0.0090, lng - 0.0005, lat + 0.0100, lng + 0.0005)),
    ));
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(Some(1800.0))), layers);
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::new()).await;

    let report = pipeline.search(SearchInput::Location(tampa())).await.unwrap();

    let bounds = report.bounds.unwrap();
    assert!(bounds.strictly_contains(&tampa()));
    assert!(bounds.width_deg() >= 0.0002);
    assert!(bounds.height_deg() >= 0.0002);
}

// ============================================================================
// Simulation fallback
// ============================================================================

#[tokio::test]
async fn test_missing_raster_falls_back_to_optimal_simulation() {
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(Some(2600.0))), layers_near_tampa(MISSING_URL));
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::new()).await;

    let report = pipeline.search(SearchInput::Location(tampa())).await.unwrap();

    assert!(report.is_simulated());
    assert_eq!(report.band, Some(IntensityBand::Optimal));
    assert!(report.fallback_reason.as_deref().unwrap().contains("404"));
    assert_eq!(
        report.trail,
        vec![
            SearchState::Idle,
            SearchState::Fetching,
            SearchState::Simulating,
            SearchState::Attached,
        ]
    );

    let session = pipeline.into_session();
    let shape = session.view().overlays().next().unwrap().shape().unwrap().clone();
    assert_eq!(shape.intensity, 1.0);
    // Footprint polygon from the insights fixture
    assert_eq!(shape.outline.len(), 4);
}

#[tokio::test]
async fn test_no_flux_layer_simulates() {
    let layers = Some(fixtures::data_layers_without_flux_json());
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(Some(1000.0))), layers);
    let (pipeline, log) = pipeline_with(provider, MemoryMapView::new()).await;

    let report = pipeline.search(SearchInput::Location(tampa())).await.unwrap();

    assert!(report.is_simulated());
    assert_eq!(report.band, Some(IntensityBand::Low));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_image_attach_simulates() {
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(Some(1800.0))), layers_near_tampa(FLUX_URL));
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::rejecting_images()).await;

    let report = pipeline.search(SearchInput::Location(tampa())).await.unwrap();

    assert!(report.is_simulated());
    assert!(report.fallback_reason.unwrap().contains("Map view"));
    assert_eq!(report.trail.last(), Some(&SearchState::Attached));

    let session = pipeline.into_session();
    assert_eq!(session.view().attach_calls(), 2);
    assert_eq!(session.view().attached_count(), 1);
}

#[tokio::test]
async fn test_rejected_image_simulates_over_raster_extent() {
    // Sunshine scalar only: no polygon, no bounding box, no provider bounds
    let insights = r#"{ "name": "buildings/scalar", "solarPotential": { "maxSunshineHoursPerYear": 2000 } }"#;
    let layers = Some(fixtures::data_layers_json(UTM_URL, None));
    let provider = FakeProvider::new(Some(insights.to_string()), layers);
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::rejecting_images()).await;

    let report = pipeline.search(SearchInput::Location(tampa())).await.unwrap();

    assert!(report.is_simulated());
    let bounds = report.bounds.unwrap();
    assert!(bounds.strictly_contains(&tampa()));
    // The 10 m raster extent, not the synthesized 0.0003 degree box
    assert!(bounds.height_deg() < 0.0002, "height {}", bounds.height_deg());
    assert!(bounds.width_deg() < 0.0002, "width {}", bounds.width_deg());
}

#[tokio::test]
async fn test_no_data_at_all_is_an_error() {
    let provider = FakeProvider::new(None, layers_near_tampa(MISSING_URL));
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::new()).await;

    let err = pipeline.search(SearchInput::Location(tampa())).await.unwrap_err();
    assert!(matches!(err, SolarError::NoSolarData));
    assert!(pipeline.with_session(|s| s.current_handle().is_none()).await);
}

#[tokio::test]
async fn test_geocode_failure_surfaces() {
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(Some(1800.0))), layers_near_tampa(FLUX_URL));
    let (pipeline, log) = pipeline_with(provider, MemoryMapView::new()).await;

    let err = pipeline
        .search(SearchInput::Address("nowhere".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, SolarError::GeocodeNotFound(_)));
    assert!(log.lock().unwrap().is_empty());
}

// ============================================================================
// Session ownership
// ============================================================================

#[tokio::test]
async fn test_repeated_searches_keep_one_overlay() {
    let provider = FakeProvider::new(Some(fixtures::building_insights_json(Some(1800.0))), layers_near_tampa(FLUX_URL));
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::new()).await;

    for _ in 0..3 {
        pipeline.search(SearchInput::Location(tampa())).await.unwrap();
    }

    let (attached, generation) = pipeline
        .with_session(|s| (s.view().attached_count(), s.generation()))
        .await;
    assert_eq!(attached, 1);
    assert_eq!(generation, 3);

    assert!(pipeline.clear().await);
    assert!(!pipeline.clear().await);
}

#[tokio::test]
async fn test_superseded_search_is_discarded() {
    let provider = FakeProvider {
        first_call_delay: Some(Duration::from_millis(300)),
        ..FakeProvider::new(Some(fixtures::building_insights_json(Some(1800.0))), layers_near_tampa(FLUX_URL))
    };
    let (pipeline, _) = pipeline_with(provider, MemoryMapView::new()).await;
    let pipeline = Arc::new(pipeline);

    let slow = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.search(SearchInput::Location(tampa())).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fast = pipeline.search(SearchInput::Location(tampa())).await.unwrap();
    let slow = slow.await.unwrap().unwrap();

    assert!(slow.stale);
    assert_eq!(slow.overlay_kind, None);
    assert!(slow.trail.is_empty());
    assert_eq!(slow.generation, 1);

    assert!(!fast.stale);
    assert_eq!(fast.overlay_kind, Some("flux_image"));
    assert_eq!(fast.generation, 2);

    let (attached, state) = pipeline
        .with_session(|s| (s.view().attached_count(), s.state()))
        .await;
    assert_eq!(attached, 1);
    assert_eq!(state, SearchState::Attached);
}
