//! Common test fixtures: anchors and provider responses.
//!
//! Provider payloads are kept as JSON text so that tests exercise the same
//! deserialization path as live responses.

/// Well-known anchor locations as `(lat, lng)`.
pub mod anchors {
    /// Downtown Tampa, FL. Flux rasters here are in UTM zone 17N.
    pub const TAMPA: (f64, f64) = (27.95, -82.46);

    /// Sydney, NSW, in UTM zone 56S.
    pub const SYDNEY: (f64, f64) = (-33.8688, 151.2093);

    /// UTM 17N easting/northing of [`TAMPA`].
    pub const TAMPA_UTM_17N: (f64, f64) = (356_374.133, 3_092_521.442);
}

/// Geocoding response with a single Tampa result.
pub fn geocode_ok_json() -> String {
    let (lat, lng) = anchors::TAMPA;
    format!(
        r#"{{
  "status": "OK",
  "results": [
    {{
      "formatted_address": "100 N Tampa St, Tampa, FL 33602, USA",
      "geometry": {{ "location": {{ "lat": {lat}, "lng": {lng} }} }}
    }}
  ]
}}"#
    )
}

/// Geocoding response for an address the geocoder cannot resolve.
pub fn geocode_zero_results_json() -> String {
    r#"{ "status": "ZERO_RESULTS", "results": [] }"#.to_string()
}

/// Geocoding response when the key is over quota.
pub fn geocode_over_limit_json() -> String {
    r#"{ "status": "OVER_QUERY_LIMIT", "results": [], "error_message": "You have exceeded your daily request quota." }"#
        .to_string()
}

/// Building insights around Tampa with a footprint polygon.
///
/// `sunshine_hours` goes into `maxSunshineHoursPerYear`; pass `None` to
/// leave the field out.
pub fn building_insights_json(sunshine_hours: Option<f64>) -> String {
    let (lat, lng) = anchors::TAMPA;
    let hours = sunshine_hours
        .map(|h| format!(r#""maxSunshineHoursPerYear": {h},"#))
        .unwrap_or_default();
    format!(
        r#"{{
  "name": "buildings/ChIJtest",
  "center": {{ "latitude": {lat}, "longitude": {lng} }},
  "imageryDate": {{ "year": 2022, "month": 3, "day": 14 }},
  "imageryQuality": "HIGH",
  "boundingBox": {{
    "sw": {{ "latitude": {s}, "longitude": {w} }},
    "ne": {{ "latitude": {n}, "longitude": {e} }}
  }},
  "solarPotential": {{
    {hours}
    "maxArrayPanelsCount": 32,
    "maxArrayAreaMeters2": 62.4,
    "panelCapacityWatts": 400,
    "carbonOffsetFactorKgPerMwh": 420.5,
    "solarPanelConfigs": [
      {{ "panelsCount": 8, "yearlyEnergyDcKwh": 4200.0 }},
      {{ "panelsCount": 16, "yearlyEnergyDcKwh": 8350.0 }},
      {{ "panelsCount": 32, "yearlyEnergyDcKwh": 16400.0 }}
    ],
    "buildingLocation": {{
      "polygon": [
        {{ "latitude": {s2}, "longitude": {w2} }},
        {{ "latitude": {s2}, "longitude": {e2} }},
        {{ "latitude": {n2}, "longitude": {e2} }},
        {{ "latitude": {n2}, "longitude": {w2} }}
      ]
    }}
  }}
}}"#,
        s = lat - 0.0002,
        w = lng - 0.0002,
        n = lat + 0.0002,
        e = lng + 0.0002,
        s2 = lat - 0.0001,
        w2 = lng - 0.0001,
        n2 = lat + 0.0001,
        e2 = lng + 0.0001,
    )
}

/// Building insights with no solar potential and no bounding box.
pub fn empty_building_insights_json() -> String {
    r#"{ "name": "buildings/empty" }"#.to_string()
}

/// Data layers response with an annual flux URL and imagery bounds.
pub fn data_layers_json(flux_url: &str, bounds: Option<(f64, f64, f64, f64)>) -> String {
    let bounds = bounds
        .map(|(s, w, n, e)| {
            format!(
                r#", "imageryBounds": {{ "sw": {{ "latitude": {s}, "longitude": {w} }}, "ne": {{ "latitude": {n}, "longitude": {e} }} }}"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"{{
  "imageryDate": {{ "year": 2022, "month": 3, "day": 14 }},
  "imageryQuality": "HIGH",
  "dsmUrl": "https://solar.googleapis.com/v1/geoTiff:get?id=dsm",
  "annualFluxUrl": "{flux_url}"{bounds}
}}"#
    )
}

/// Data layers response without any flux URL.
pub fn data_layers_without_flux_json() -> String {
    r#"{ "imageryQuality": "LOW", "dsmUrl": "https://solar.googleapis.com/v1/geoTiff:get?id=dsm" }"#.to_string()
}
