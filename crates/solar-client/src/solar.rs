//! Solar insights provider.
//!
//! Two lookups feed a search: building insights (summary scalars and the
//! footprint) and data layers (the flux raster URL and its bounds). Data
//! layer coverage varies with the requested view and radius, so the
//! pipeline walks a prioritized chain of requests and keeps the first
//! response that names a flux raster.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use solar_common::{BuildingInsights, DataLayers, LatLng, SolarError, SolarResult};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_SOLAR_ENDPOINT: &str = "https://solar.googleapis.com/v1";

/// Which layers a data layer request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataLayerView {
    DsmLayer,
    ImageryLayers,
    ImageryAndAnnualFluxLayers,
    ImageryAndAllFluxLayers,
    AnnualFluxLayer,
    FullLayers,
}

impl DataLayerView {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataLayerView::DsmLayer => "DSM_LAYER",
            DataLayerView::ImageryLayers => "IMAGERY_LAYERS",
            DataLayerView::ImageryAndAnnualFluxLayers => "IMAGERY_AND_ANNUAL_FLUX_LAYERS",
            DataLayerView::ImageryAndAllFluxLayers => "IMAGERY_AND_ALL_FLUX_LAYERS",
            DataLayerView::AnnualFluxLayer => "ANNUAL_FLUX_LAYER",
            DataLayerView::FullLayers => "FULL_LAYERS",
        }
    }
}

impl std::fmt::Display for DataLayerView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of one `dataLayers:get` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLayerRequest {
    pub view: DataLayerView,
    pub radius_meters: f64,
    pub required_quality: String,
    pub pixel_size_meters: f64,
    pub exact_quality_required: bool,
}

impl Default for DataLayerRequest {
    fn default() -> Self {
        Self {
            view: DataLayerView::FullLayers,
            radius_meters: 100.0,
            required_quality: "HIGH".to_string(),
            pixel_size_meters: 0.1,
            exact_quality_required: false,
        }
    }
}

impl DataLayerRequest {
    pub fn new(view: DataLayerView, radius_meters: f64) -> Self {
        Self {
            view,
            radius_meters,
            ..Self::default()
        }
    }

    fn query(&self, location: LatLng) -> Vec<(&'static str, String)> {
        vec![
            ("location.latitude", location.lat.to_string()),
            ("location.longitude", location.lng.to_string()),
            ("radiusMeters", self.radius_meters.to_string()),
            ("view", self.view.as_str().to_string()),
            ("requiredQuality", self.required_quality.clone()),
            ("pixelSizeMeters", self.pixel_size_meters.to_string()),
            ("exactQualityRequired", self.exact_quality_required.to_string()),
        ]
    }
}

/// Requests tried in order until one yields a flux URL.
pub fn default_request_chain() -> Vec<DataLayerRequest> {
    vec![
        DataLayerRequest::new(DataLayerView::ImageryAndAnnualFluxLayers, 100.0),
        DataLayerRequest::new(DataLayerView::AnnualFluxLayer, 100.0),
        DataLayerRequest::new(DataLayerView::FullLayers, 50.0),
    ]
}

/// Building insights and data layer lookups.
#[async_trait]
pub trait SolarProvider: Send + Sync {
    /// Insights for the building closest to `location`.
    /// No building nearby fails with `NoSolarData`.
    async fn building_insights(&self, location: LatLng) -> SolarResult<BuildingInsights>;

    /// Data layers around `location`.
    async fn data_layers(&self, location: LatLng, request: &DataLayerRequest) -> SolarResult<DataLayers>;
}

/// Walk `chain` and return the first data layers response with a flux URL.
///
/// Failed attempts are logged and skipped. `Ok(None)` means no request in
/// the chain produced a flux raster.
pub async fn first_flux_layers<P>(
    provider: &P,
    location: LatLng,
    chain: &[DataLayerRequest],
) -> SolarResult<Option<(DataLayers, DataLayerRequest)>>
where
    P: SolarProvider + ?Sized,
{
    for (attempt, request) in chain.iter().enumerate() {
        match provider.data_layers(location, request).await {
            Ok(layers) if layers.has_flux() => {
                info!(
                    attempt = attempt + 1,
                    view = %request.view,
                    radius_m = request.radius_meters,
                    "Data layers include a flux raster"
                );
                return Ok(Some((layers, request.clone())));
            }
            Ok(_) => {
                debug!(attempt = attempt + 1, view = %request.view, "Data layers without flux URL");
            }
            Err(e) => {
                warn!(
                    attempt = attempt + 1,
                    view = %request.view,
                    error = %e,
                    "Data layer request failed, trying next"
                );
            }
        }
    }

    warn!(attempts = chain.len(), "No data layer request produced a flux raster");
    Ok(None)
}

/// Google Solar API client.
#[derive(Debug, Clone)]
pub struct GoogleSolarClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GoogleSolarClient {
    pub fn new(api_key: impl Into<String>) -> SolarResult<Self> {
        Self::with_endpoint(DEFAULT_SOLAR_ENDPOINT, api_key)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> SolarResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SolarError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn get_json<T>(&self, method: &str, query: Vec<(&'static str, String)>) -> SolarResult<T>
    where
        T: DeserializeOwned,
    {
        counter!("solar_api_requests_total", "method" => method.to_string()).increment(1);
        let url = format!("{}/{}", self.endpoint, method);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SolarError::ProviderError(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(method, "Provider has no data for this location");
            return Err(SolarError::NoSolarData);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(method, status = status.as_u16(), "Provider request rejected");
            return Err(SolarError::ProviderError(format!(
                "{} returned HTTP {}: {}",
                method,
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SolarError::ProviderError(format!("invalid {} response: {}", method, e)))
    }
}

#[async_trait]
impl SolarProvider for GoogleSolarClient {
    #[instrument(skip(self))]
    async fn building_insights(&self, location: LatLng) -> SolarResult<BuildingInsights> {
        let insights: BuildingInsights = self
            .get_json(
                "buildingInsights:findClosest",
                vec![
                    ("location.latitude", location.lat.to_string()),
                    ("location.longitude", location.lng.to_string()),
                ],
            )
            .await?;

        info!(
            building = insights.name.as_deref().unwrap_or("unnamed"),
            sunshine_hours = insights.max_sunshine_hours(),
            "Building insights received"
        );
        Ok(insights)
    }

    #[instrument(skip(self, request), fields(view = %request.view))]
    async fn data_layers(&self, location: LatLng, request: &DataLayerRequest) -> SolarResult<DataLayers> {
        self.get_json("dataLayers:get", request.query(location)).await
    }
}
