//! Response shapes of the geocoding and solar insights providers.
//!
//! The provider has changed field names over time and the site has seen
//! several of them in the wild. Every alias is deserialized into its own
//! field and resolved in a fixed priority order by accessor methods, so a
//! response carrying two aliases never fails to parse.

use serde::{Deserialize, Serialize};

use crate::bounds::GeoBounds;
use crate::geo::LatLng;

/// `{latitude, longitude}` as used by the solar API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLngLiteral {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<LatLngLiteral> for LatLng {
    fn from(p: LatLngLiteral) -> Self {
        LatLng::new(p.latitude, p.longitude)
    }
}

/// `{sw, ne}` box as used by the solar API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsLiteral {
    pub sw: LatLngLiteral,
    pub ne: LatLngLiteral,
}

impl From<BoundsLiteral> for GeoBounds {
    fn from(b: BoundsLiteral) -> Self {
        GeoBounds::new(b.sw.into(), b.ne.into())
    }
}

/// Calendar date as returned by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl std::fmt::Display for ProviderDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

// ============================================================================
// Geocoding
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResult {
    pub geometry: GeocodeGeometry,
    #[serde(default)]
    pub formatted_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeGeometry {
    pub location: LatLng,
}

// ============================================================================
// Building insights
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingInsights {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub center: Option<LatLngLiteral>,
    #[serde(default)]
    pub bounding_box: Option<BoundsLiteral>,
    #[serde(default)]
    pub imagery_date: Option<ProviderDate>,
    #[serde(default)]
    pub imagery_quality: Option<String>,
    #[serde(default)]
    pub solar_potential: Option<SolarPotential>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarPotential {
    #[serde(default)]
    pub max_array_panels_count: Option<u32>,
    #[serde(default)]
    pub panel_count: Option<u32>,
    #[serde(default)]
    pub max_array_area_meters2: Option<f64>,
    #[serde(default)]
    pub max_sunshine_hours_per_year: Option<f64>,
    #[serde(default)]
    pub carbon_offset_factor_kg_per_mwh: Option<f64>,
    #[serde(default)]
    pub panel_capacity_watts: Option<f64>,
    #[serde(default)]
    pub max_pof_watts_peak: Option<f64>,
    #[serde(default)]
    pub max_annual_kwh: Option<f64>,
    #[serde(default)]
    pub solar_panel_configs: Vec<PanelConfig>,
    #[serde(default)]
    pub panel_config_groups: Vec<PanelConfig>,
    #[serde(default)]
    pub building_location: Option<BuildingLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelConfig {
    #[serde(default)]
    pub panels_count: Option<u32>,
    #[serde(default)]
    pub panel_count: Option<u32>,
    #[serde(default)]
    pub yearly_energy_dc_kwh: Option<f64>,
    #[serde(default)]
    pub yearly_kwh_production: Option<f64>,
}

impl PanelConfig {
    pub fn panels(&self) -> u32 {
        self.panels_count.or(self.panel_count).unwrap_or(0)
    }

    pub fn yearly_kwh(&self) -> f64 {
        self.yearly_energy_dc_kwh
            .or(self.yearly_kwh_production)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildingLocation {
    #[serde(default)]
    pub polygon: Vec<LatLngLiteral>,
}

impl SolarPotential {
    pub fn max_panels(&self) -> Option<u32> {
        self.max_array_panels_count.or(self.panel_count)
    }

    /// Panel configurations, preferring the current field name.
    pub fn panel_configs(&self) -> &[PanelConfig] {
        if self.solar_panel_configs.is_empty() {
            &self.panel_config_groups
        } else {
            &self.solar_panel_configs
        }
    }

    /// Annual production of the largest configuration, in kWh.
    pub fn annual_kwh(&self) -> Option<f64> {
        self.max_annual_kwh.or_else(|| {
            self.panel_configs()
                .iter()
                .max_by_key(|c| c.panels())
                .map(|c| c.yearly_kwh())
                .filter(|kwh| *kwh > 0.0)
        })
    }

    /// Peak system power in watts.
    pub fn peak_watts(&self) -> Option<f64> {
        self.max_pof_watts_peak.or_else(|| {
            match (self.max_panels(), self.panel_capacity_watts) {
                (Some(n), Some(w)) => Some(n as f64 * w),
                _ => None,
            }
        })
    }
}

impl BuildingInsights {
    /// Building footprint: explicit polygon when present, else the bounding box ring.
    pub fn footprint(&self) -> Vec<LatLng> {
        if let Some(polygon) = self
            .solar_potential
            .as_ref()
            .and_then(|p| p.building_location.as_ref())
            .map(|l| &l.polygon)
            .filter(|p| p.len() >= 3)
        {
            return polygon.iter().map(|&p| p.into()).collect();
        }

        match self.bounding_box {
            Some(bb) => {
                let b: GeoBounds = GeoBounds::from(bb).normalized();
                vec![
                    LatLng::new(b.south(), b.west()),
                    LatLng::new(b.south(), b.east()),
                    LatLng::new(b.north(), b.east()),
                    LatLng::new(b.north(), b.west()),
                ]
            }
            None => Vec::new(),
        }
    }

    pub fn max_sunshine_hours(&self) -> Option<f64> {
        self.solar_potential
            .as_ref()
            .and_then(|p| p.max_sunshine_hours_per_year)
            .filter(|h| h.is_finite() && *h >= 0.0)
    }
}

// ============================================================================
// Data layers
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLayers {
    #[serde(default)]
    pub imagery_date: Option<ProviderDate>,
    #[serde(default)]
    pub imagery_quality: Option<String>,
    #[serde(default)]
    pub dsm_url: Option<String>,
    #[serde(default)]
    pub rgb_url: Option<String>,
    #[serde(default)]
    pub mask_url: Option<String>,

    // Flux URL aliases
    #[serde(default)]
    pub annual_flux_url: Option<String>,
    #[serde(default)]
    pub monthly_flux_url: Option<String>,
    #[serde(default)]
    pub flux_url: Option<String>,
    #[serde(default)]
    pub irradiance_url: Option<String>,

    // Bounds aliases
    #[serde(default)]
    pub imagery_bounds: Option<BoundsLiteral>,
    #[serde(default)]
    pub annual_flux_bounds: Option<BoundsLiteral>,
    #[serde(default)]
    pub estimated_bounds: Option<BoundsLiteral>,
    #[serde(default)]
    pub dsm_bounds: Option<BoundsLiteral>,
    #[serde(default)]
    pub bounds: Option<BoundsLiteral>,
}

impl DataLayers {
    /// First non-empty flux URL in priority order.
    pub fn flux_url(&self) -> Option<&str> {
        [
            &self.annual_flux_url,
            &self.monthly_flux_url,
            &self.flux_url,
            &self.irradiance_url,
        ]
        .into_iter()
        .filter_map(|u| u.as_deref())
        .find(|u| !u.trim().is_empty())
    }

    /// First bounds alias in priority order.
    pub fn bounds(&self) -> Option<GeoBounds> {
        [
            self.imagery_bounds,
            self.annual_flux_bounds,
            self.estimated_bounds,
            self.dsm_bounds,
            self.bounds,
        ]
        .into_iter()
        .flatten()
        .next()
        .map(GeoBounds::from)
    }

    pub fn has_flux(&self) -> bool {
        self.flux_url().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_bounds_aliases_parse() {
        let json = r#"{
            "annualFluxUrl": "https://solar.googleapis.com/v1/geoTiff:get?id=a",
            "dsmBounds": {"sw": {"latitude": 1.0, "longitude": 2.0}, "ne": {"latitude": 3.0, "longitude": 4.0}},
            "imageryBounds": {"sw": {"latitude": 10.0, "longitude": 20.0}, "ne": {"latitude": 30.0, "longitude": 40.0}}
        }"#;
        let layers: DataLayers = serde_json::from_str(json).unwrap();
        assert_eq!(layers.bounds().unwrap().south(), 10.0);
    }

    #[test]
    fn test_footprint_from_bounding_box() {
        let json = r#"{
            "boundingBox": {"sw": {"latitude": 27.0, "longitude": -83.0}, "ne": {"latitude": 28.0, "longitude": -82.0}}
        }"#;
        let insights: BuildingInsights = serde_json::from_str(json).unwrap();
        assert_eq!(insights.footprint().len(), 4);
    }
}
