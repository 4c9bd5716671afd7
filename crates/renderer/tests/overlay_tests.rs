//! Tests for overlay rendering and the simulation fallback.

use flux_raster::DecodedRaster;
use renderer::gradient::{map_to_color, Color};
use renderer::simulation::{IntensityBand, SimulationInput, Simulator, SIMULATION_OPACITY};
use renderer::{render_overlay, OverlayContent, OverlayRenderer, Resampling, RASTER_OPACITY};
use solar_common::{GeoBounds, LatLng, SolarError, Viewport, MIN_SAFETY_MARGIN_DEG};
use test_utils::{assert_latlng_approx_eq, create_flux_grid, create_masked_flux_grid, create_uniform_grid};

const TAMPA: LatLng = LatLng {
    lat: 27.95,
    lng: -82.46,
};

fn tampa_bounds() -> GeoBounds {
    GeoBounds::around(TAMPA, 0.0005)
}

// ============================================================================
// Raster rendering
// ============================================================================

#[test]
fn test_no_data_and_extremes() {
    let raster = DecodedRaster::new(2, 2, vec![0.0, 0.0, 50.0, 100.0], None).unwrap();
    let overlay = render_overlay(&raster, tampa_bounds(), TAMPA, Viewport::new(2, 2)).unwrap();
    let img = overlay.image().unwrap();

    assert_eq!(img.pixel(0, 0), Color::transparent());
    assert_eq!(img.pixel(1, 0), Color::transparent());
    assert_eq!(img.pixel(0, 1), map_to_color(0.0));
    assert_eq!(img.pixel(1, 1), map_to_color(1.0));
    assert_eq!(img.pixel(1, 1), Color::new(255, 0, 0, 255));
}

#[test]
fn test_uniform_raster_renders_uniformly() {
    let raster = DecodedRaster::new(3, 3, create_uniform_grid(3, 3, 1234.0), None).unwrap();
    let overlay = render_overlay(&raster, tampa_bounds(), TAMPA, Viewport::new(9, 9)).unwrap();
    let img = overlay.image().unwrap();

    let first = img.pixel(0, 0);
    for y in 0..9 {
        for x in 0..9 {
            assert_eq!(img.pixel(x, y), first);
        }
    }
}

#[test]
fn test_nearest_neighbour_upscale() {
    // 2x2 source onto 4x4: each source cell covers a 2x2 block
    let raster = DecodedRaster::new(2, 2, vec![10.0, 20.0, 30.0, 40.0], None).unwrap();
    let overlay = render_overlay(&raster, tampa_bounds(), TAMPA, Viewport::new(4, 4)).unwrap();
    let img = overlay.image().unwrap();

    let expected = |v: f32| map_to_color((v - 10.0) / 30.0);
    assert_eq!(img.pixel(0, 0), expected(10.0));
    assert_eq!(img.pixel(1, 1), expected(10.0));
    assert_eq!(img.pixel(2, 0), expected(20.0));
    assert_eq!(img.pixel(3, 1), expected(20.0));
    assert_eq!(img.pixel(0, 2), expected(30.0));
    assert_eq!(img.pixel(3, 3), expected(40.0));
}

#[test]
fn test_parallel_matches_sequential_definition() {
    let (rw, rh) = (37, 23);
    let raster = DecodedRaster::new(rw, rh, create_masked_flux_grid(rw, rh, 3), None).unwrap();
    let (vw, vh) = (101usize, 67usize);
    let pixels = OverlayRenderer::default().render_pixels(&raster, Viewport::new(vw as u32, vh as u32));

    for y in 0..vh {
        for x in 0..vw {
            let sx = ((x as f64 / vw as f64) * rw as f64).floor() as usize;
            let sy = ((y as f64 / vh as f64) * rh as f64).floor() as usize;
            let v = raster.sample(sx, sy);
            let expected = match raster.normalize(v) {
                Some(n) => map_to_color(n),
                None => Color::transparent(),
            };
            let i = (y * vw + x) * 4;
            assert_eq!(&pixels[i..i + 4], &expected.to_array(), "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn test_overlay_carries_bounds_and_opacity() {
    let raster = DecodedRaster::new(8, 8, create_flux_grid(8, 8), None).unwrap();
    let overlay = render_overlay(&raster, tampa_bounds(), TAMPA, Viewport::default()).unwrap();

    assert_eq!(overlay.bounds, tampa_bounds());
    assert_eq!(overlay.opacity, RASTER_OPACITY);
    assert!(!overlay.is_simulated());
    let img = overlay.image().unwrap();
    assert_eq!((img.width, img.height), (800, 800));
    assert_eq!(img.pixels.len(), 800 * 800 * 4);
}

#[test]
fn test_bilinear_keeps_no_data_transparent() {
    let raster = DecodedRaster::new(10, 10, create_masked_flux_grid(10, 10, 2), None).unwrap();
    let renderer = OverlayRenderer::new(Default::default(), Resampling::Bilinear);
    let overlay = renderer.render(&raster, tampa_bounds(), TAMPA, Viewport::new(50, 50)).unwrap();
    let img = overlay.image().unwrap();

    // Border cells are no-data in the source
    assert_eq!(img.pixel(0, 0), Color::transparent());
    assert_eq!(img.pixel(49, 49), Color::transparent());
    // Center is the flux peak
    assert!(img.pixel(25, 25).a > 0);
}

#[test]
fn test_empty_viewport_is_rejected() {
    let raster = DecodedRaster::new(2, 2, vec![1.0; 4], None).unwrap();
    let result = render_overlay(&raster, tampa_bounds(), TAMPA, Viewport::new(0, 10));
    assert!(result.is_err());
}

#[test]
fn test_invalid_anchor_is_rejected() {
    let raster = DecodedRaster::new(2, 2, vec![1.0; 4], None).unwrap();
    let result = render_overlay(&raster, tampa_bounds(), LatLng::new(f64::NAN, 0.0), Viewport::new(2, 2));
    assert!(matches!(result, Err(SolarError::InvalidBounds(_))));
}

#[test]
fn test_png_of_overlay() {
    let raster = DecodedRaster::new(8, 8, create_flux_grid(8, 8), None).unwrap();
    let overlay = render_overlay(&raster, tampa_bounds(), TAMPA, Viewport::new(64, 64)).unwrap();
    let png = overlay.image().unwrap().to_png().unwrap();
    assert_eq!(&png[..4], &[137, 80, 78, 71]);
}

// ============================================================================
// Bounds repair
// ============================================================================

#[test]
fn test_bounds_one_kilometer_away_are_recentered() {
    // ~1 km north-east of the anchor
    let far = GeoBounds::from_edges(27.959, -82.451, 27.960, -82.450);
    let raster = DecodedRaster::new(4, 4, create_flux_grid(4, 4), None).unwrap();
    let overlay = render_overlay(&raster, far, TAMPA, Viewport::new(4, 4)).unwrap();

    assert!(overlay.bounds.strictly_contains(&TAMPA));
    assert!(overlay.bounds.width_deg() >= 2.0 * MIN_SAFETY_MARGIN_DEG);
    assert!(overlay.bounds.height_deg() >= 2.0 * MIN_SAFETY_MARGIN_DEG);
    assert_latlng_approx_eq!(overlay.bounds.center(), (TAMPA.lat, TAMPA.lng), 1e-12);
}

#[test]
fn test_degenerate_bounds_get_margin() {
    let point = GeoBounds::new(TAMPA, TAMPA);
    let raster = DecodedRaster::new(1, 1, vec![5.0], None).unwrap();
    let overlay = render_overlay(&raster, point, TAMPA, Viewport::new(1, 1)).unwrap();

    assert!(overlay.bounds.is_valid());
    assert!(overlay.bounds.strictly_contains(&TAMPA));
}

// ============================================================================
// Simulation fallback
// ============================================================================

fn footprint() -> Vec<LatLng> {
    vec![
        LatLng::new(27.9499, -82.4601),
        LatLng::new(27.9499, -82.4599),
        LatLng::new(27.9501, -82.4599),
        LatLng::new(27.9501, -82.4601),
    ]
}

#[test]
fn test_high_sunshine_is_optimal() {
    let fp = footprint();
    let overlay = Simulator::default()
        .simulate(&SimulationInput {
            anchor: TAMPA,
            max_sunshine_hours: Some(2600.0),
            footprint: &fp,
            bounds: None,
        })
        .unwrap();

    let shape = overlay.shape().unwrap();
    assert_eq!(shape.intensity, 1.0);
    assert_eq!(shape.band, IntensityBand::Optimal);
    assert_eq!(shape.fill, Color::new(255, 69, 0, 255));
    assert_eq!(shape.outline, fp);
    assert_eq!(overlay.opacity, SIMULATION_OPACITY);
    assert!(overlay.bounds.strictly_contains(&TAMPA));
}

#[test]
fn test_missing_scalar_with_footprint_is_half_intensity() {
    let fp = footprint();
    let overlay = Simulator::default()
        .simulate(&SimulationInput {
            anchor: TAMPA,
            max_sunshine_hours: None,
            footprint: &fp,
            bounds: None,
        })
        .unwrap();

    let shape = overlay.shape().unwrap();
    assert_eq!(shape.intensity, 0.5);
    assert_eq!(shape.band, IntensityBand::Good);
}

#[test]
fn test_scalar_without_footprint_fills_bounds() {
    let bounds = GeoBounds::around(TAMPA, 0.0004);
    let overlay = Simulator::default()
        .simulate(&SimulationInput {
            anchor: TAMPA,
            max_sunshine_hours: Some(1000.0),
            footprint: &[],
            bounds: Some(bounds),
        })
        .unwrap();

    assert_eq!(overlay.bounds, bounds);
    match &overlay.content {
        OverlayContent::Simulated(shape) => {
            assert_eq!(shape.band, IntensityBand::Low);
            assert_eq!(shape.outline.len(), 4);
            assert!(shape.outline.iter().all(|p| bounds.contains_point(p)));
        }
        other => panic!("expected a simulated shape, got {:?}", other),
    }
}

#[test]
fn test_scalar_only_synthesizes_box() {
    let sim = Simulator::default();
    let overlay = sim
        .simulate(&SimulationInput {
            anchor: TAMPA,
            max_sunshine_hours: Some(1900.0),
            footprint: &[],
            bounds: None,
        })
        .unwrap();

    assert!(overlay.bounds.strictly_contains(&TAMPA));
    let expected = 2.0 * sim.synthesized_half_extent_deg;
    assert!((overlay.bounds.width_deg() - expected).abs() < 1e-12);
    assert_eq!(overlay.shape().unwrap().band, IntensityBand::High);
}

#[test]
fn test_nothing_known_is_no_solar_data() {
    let result = Simulator::default().simulate(&SimulationInput {
        anchor: TAMPA,
        max_sunshine_hours: None,
        footprint: &[],
        bounds: Some(tampa_bounds()),
    });
    assert!(matches!(result, Err(SolarError::NoSolarData)));
}

#[test]
fn test_custom_ceiling() {
    let sim = Simulator {
        sun_hours_ceiling: 2000.0,
        ..Simulator::default()
    };
    assert_eq!(sim.intensity(Some(1800.0)), 0.9);
}
