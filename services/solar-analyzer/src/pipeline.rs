//! Address to overlay search.
//!
//! One search runs geocoding, building insights, the data layer chain, the
//! bounded raster fetch and decode, rendering and the final attach. Every
//! failure after geocoding degrades to the simulated overlay, which needs
//! only the building footprint or the sunshine scalar.
//!
//! The session lock is taken for state transitions and the attach only,
//! never across a network call, so a newer search can start while an older
//! one is still waiting on the provider. The older one then finds its
//! ticket stale and attaches nothing.

use std::sync::Arc;

use flux_raster::{DecodedRaster, FluxFetcher};
use metrics::counter;
use renderer::{
    AttachOutcome, Gradient, IntensityBand, MapView, OverlayRenderer, OverlaySession, RenderedOverlay, SearchState,
    SearchTicket, SimulationInput, Simulator,
};
use serde::Serialize;
use solar_client::{
    first_flux_layers, proxied_url, with_api_key, DataLayerRequest, Geocoder, GoogleGeocoder, GoogleSolarClient,
    SolarProvider,
};
use solar_common::{
    BuildingInsights, GeoBounds, LatLng, SolarError, SolarResult, Viewport, MIN_SAFETY_MARGIN_DEG,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::AnalyzerConfig;
use crate::summary::{Assumptions, InsightsSummary};

/// Where a search starts.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchInput {
    Address(String),
    Location(LatLng),
}

/// Outcome of one search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub generation: u64,
    pub location: LatLng,
    pub formatted_address: Option<String>,
    /// `flux_image` or `simulated`; `None` when a newer search superseded this one
    pub overlay_kind: Option<&'static str>,
    pub bounds: Option<GeoBounds>,
    /// Intensity band of a simulated overlay
    pub band: Option<IntensityBand>,
    /// Why the raster overlay was not used
    pub fallback_reason: Option<String>,
    /// States visited, empty for a superseded search
    pub trail: Vec<SearchState>,
    pub summary: Option<InsightsSummary>,
    pub stale: bool,
}

impl SearchReport {
    pub fn is_simulated(&self) -> bool {
        self.overlay_kind == Some("simulated")
    }
}

enum Flow {
    Continue,
    Stale,
}

enum RasterOutcome {
    Attached,
    Stale,
    Failed {
        error: SolarError,
        /// Provider bounds, else the raster's own extent once decoded
        fallback_bounds: Option<GeoBounds>,
    },
}

/// Runs searches against one map view.
pub struct SearchPipeline<V: MapView> {
    geocoder: Arc<dyn Geocoder>,
    provider: Arc<dyn SolarProvider>,
    fetcher: FluxFetcher,
    renderer: OverlayRenderer,
    simulator: Simulator,
    session: Mutex<OverlaySession<V>>,
    api_key: String,
    proxy_base_url: String,
    chain: Vec<DataLayerRequest>,
    viewport: Viewport,
    assumptions: Assumptions,
}

impl<V: MapView> SearchPipeline<V> {
    pub fn new(
        config: &AnalyzerConfig,
        geocoder: Arc<dyn Geocoder>,
        provider: Arc<dyn SolarProvider>,
        view: V,
    ) -> SolarResult<Self> {
        Ok(Self {
            geocoder,
            provider,
            fetcher: FluxFetcher::new(config.fetch_config())?,
            renderer: OverlayRenderer::new(Gradient::flux(), config.resampling),
            simulator: Simulator {
                sun_hours_ceiling: config.sun_hours_ceiling,
                min_margin_deg: MIN_SAFETY_MARGIN_DEG,
                synthesized_half_extent_deg: config.synthesized_half_extent_deg,
            },
            session: Mutex::new(OverlaySession::new(view)),
            api_key: config.api_key.clone(),
            proxy_base_url: config.proxy_base_url.clone(),
            chain: config.data_layer_chain.clone(),
            viewport: config.viewport,
            assumptions: config.assumptions,
        })
    }

    /// Pipeline backed by the Google geocoding and solar APIs.
    pub fn from_config(config: &AnalyzerConfig, view: V) -> SolarResult<Self> {
        let geocoder = GoogleGeocoder::with_endpoint(&config.geocode_endpoint, &config.api_key)?;
        let provider = GoogleSolarClient::with_endpoint(&config.solar_endpoint, &config.api_key)?;
        Self::new(config, Arc::new(geocoder), Arc::new(provider), view)
    }

    /// Run one search to completion.
    ///
    /// Geocoding failures are returned as errors. After that the search
    /// only fails when neither a raster nor any scalar data is available.
    #[instrument(skip(self))]
    pub async fn search(&self, input: SearchInput) -> SolarResult<SearchReport> {
        let ticket = self.session.lock().await.begin_search();

        let (location, formatted_address) = match input {
            SearchInput::Address(address) => {
                let geocoded = self.geocoder.geocode(&address).await?;
                (geocoded.location, geocoded.formatted_address)
            }
            SearchInput::Location(location) => {
                if !location.is_valid() {
                    return Err(SolarError::InvalidBounds(format!("{} is not a valid location", location)));
                }
                (location, None)
            }
        };
        info!(generation = ticket.generation(), location = %location, "Searching");

        let (insights, insights_error) = match self.provider.building_insights(location).await {
            Ok(insights) => (Some(insights), None),
            Err(e) => {
                warn!(error = %e, "Building insights unavailable");
                (None, Some(e))
            }
        };
        let summary = insights
            .as_ref()
            .map(|i| InsightsSummary::with_assumptions(i, &self.assumptions));

        let mut report = SearchReport {
            generation: ticket.generation(),
            location,
            formatted_address,
            overlay_kind: None,
            bounds: None,
            band: None,
            fallback_reason: None,
            trail: Vec::new(),
            summary,
            stale: false,
        };

        match self.raster_overlay(&ticket, location).await {
            RasterOutcome::Attached => {}
            RasterOutcome::Stale => return Ok(stale(report)),
            RasterOutcome::Failed { error, fallback_bounds } => {
                counter!("overlay_simulations_total", "reason" => error.kind()).increment(1);
                warn!(error = %error, kind = error.kind(), "Flux raster unavailable, simulating overlay");

                match self
                    .simulate_and_attach(&ticket, location, insights.as_ref(), fallback_bounds)
                    .await
                {
                    Ok((Flow::Continue, band)) => {
                        report.band = band;
                        report.fallback_reason = Some(error.to_string());
                    }
                    Ok((Flow::Stale, _)) => return Ok(stale(report)),
                    Err(SolarError::NoSolarData) => {
                        return Err(insights_error.unwrap_or(SolarError::NoSolarData));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let session = self.session.lock().await;
        if !session.is_current(&ticket) {
            return Ok(stale(report));
        }
        report.overlay_kind = session.current_kind();
        report.bounds = session.current_bounds();
        report.trail = session.trail().to_vec();
        info!(
            generation = report.generation,
            kind = report.overlay_kind.unwrap_or("none"),
            "Search complete"
        );
        Ok(report)
    }

    /// Fetch, decode, render and attach the flux raster.
    async fn raster_overlay(&self, ticket: &SearchTicket, location: LatLng) -> RasterOutcome {
        if let Flow::Stale = self.advance(ticket, SearchState::Fetching).await {
            return RasterOutcome::Stale;
        }

        let layers = match first_flux_layers(self.provider.as_ref(), location, &self.chain).await {
            Ok(Some((layers, _))) => layers,
            Ok(None) => {
                return RasterOutcome::Failed {
                    error: SolarError::NoSolarData,
                    fallback_bounds: None,
                }
            }
            Err(error) => {
                return RasterOutcome::Failed {
                    error,
                    fallback_bounds: None,
                }
            }
        };
        let provider_bounds = layers.bounds();
        let fail = |error| RasterOutcome::Failed {
            error,
            fallback_bounds: provider_bounds,
        };

        let url = match layers
            .flux_url()
            .ok_or(SolarError::NoSolarData)
            .and_then(|flux| with_api_key(flux, &self.api_key))
            .and_then(|flux| proxied_url(&self.proxy_base_url, &flux))
        {
            Ok(url) => url,
            Err(e) => return fail(e),
        };

        let buffer = match self.fetcher.fetch(&url).await {
            Ok(buffer) => buffer,
            Err(e) => return fail(e),
        };

        if let Flow::Stale = self.advance(ticket, SearchState::Decoding).await {
            return RasterOutcome::Stale;
        }
        let raster = match self.fetcher.decode(buffer).await {
            Ok(raster) => raster,
            Err(e) => return fail(e),
        };

        let raster_bounds = raster.bounds();
        let fail = |error| RasterOutcome::Failed {
            error,
            fallback_bounds: provider_bounds.or(raster_bounds),
        };

        if let Flow::Stale = self.advance(ticket, SearchState::Rendering).await {
            return RasterOutcome::Stale;
        }
        let bounds = match (provider_bounds, raster_bounds) {
            (Some(b), _) => b,
            (None, Some(b)) => {
                debug!("Using bounds embedded in the raster");
                b
            }
            (None, None) => {
                debug!("No bounds available, synthesizing around the anchor");
                GeoBounds::around(location, self.simulator.synthesized_half_extent_deg)
            }
        };
        let overlay = match self.render(raster, bounds, location).await {
            Ok(overlay) => overlay,
            Err(e) => return fail(e),
        };

        match self.attach(ticket, &overlay).await {
            Ok(Flow::Continue) => RasterOutcome::Attached,
            Ok(Flow::Stale) => RasterOutcome::Stale,
            Err(e) => fail(e),
        }
    }

    /// Render on the blocking pool; the raster is dropped there once drawn.
    async fn render(&self, raster: DecodedRaster, bounds: GeoBounds, anchor: LatLng) -> SolarResult<RenderedOverlay> {
        let renderer = self.renderer.clone();
        let viewport = self.viewport;
        tokio::task::spawn_blocking(move || renderer.render(&raster, bounds, anchor, viewport))
            .await
            .map_err(|e| SolarError::MapView(format!("render task failed: {}", e)))?
    }

    async fn simulate_and_attach(
        &self,
        ticket: &SearchTicket,
        location: LatLng,
        insights: Option<&BuildingInsights>,
        bounds: Option<GeoBounds>,
    ) -> SolarResult<(Flow, Option<IntensityBand>)> {
        if let Flow::Stale = self.advance(ticket, SearchState::Simulating).await {
            return Ok((Flow::Stale, None));
        }

        let footprint = insights.map(|i| i.footprint()).unwrap_or_default();
        let input = SimulationInput {
            anchor: location,
            max_sunshine_hours: insights.and_then(|i| i.max_sunshine_hours()),
            footprint: &footprint,
            bounds,
        };
        let overlay = self.simulator.simulate(&input)?;
        let band = overlay.shape().map(|s| s.band);

        Ok((self.attach(ticket, &overlay).await?, band))
    }

    async fn advance(&self, ticket: &SearchTicket, next: SearchState) -> Flow {
        let mut session = self.session.lock().await;
        if session.advance(ticket, next) || session.is_current(ticket) {
            Flow::Continue
        } else {
            Flow::Stale
        }
    }

    async fn attach(&self, ticket: &SearchTicket, overlay: &RenderedOverlay) -> SolarResult<Flow> {
        let mut session = self.session.lock().await;
        match session.attach(ticket, overlay)? {
            AttachOutcome::Attached(_) => Ok(Flow::Continue),
            AttachOutcome::Stale { .. } => Ok(Flow::Stale),
        }
    }

    /// Remove the attached overlay, if any.
    pub async fn clear(&self) -> bool {
        self.session.lock().await.detach_current()
    }

    /// Run `f` against the session under its lock.
    pub async fn with_session<R>(&self, f: impl FnOnce(&OverlaySession<V>) -> R) -> R {
        f(&*self.session.lock().await)
    }

    pub fn into_session(self) -> OverlaySession<V> {
        self.session.into_inner()
    }
}

fn stale(mut report: SearchReport) -> SearchReport {
    info!(generation = report.generation, "Search superseded, result discarded");
    report.stale = true;
    report.overlay_kind = None;
    report.bounds = None;
    report.band = None;
    report.trail.clear();
    report
}
