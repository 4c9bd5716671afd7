//! Display figures derived from building insights.

use serde::{Deserialize, Serialize};
use solar_common::BuildingInsights;

/// Rates behind the financial and environmental estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    /// Installed cost, USD per watt
    pub cost_per_watt: f64,
    /// Electricity price, USD per kWh
    pub electricity_rate: f64,
    /// Federal tax credit as a fraction of system cost
    pub tax_credit: f64,
    pub co2_kg_per_kwh: f64,
    /// CO2 a tree absorbs per year, kg
    pub co2_kg_per_tree: f64,
    /// Panel rating used to size configurations
    pub panel_watts: f64,
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            cost_per_watt: 3.50,
            electricity_rate: 0.12,
            tax_credit: 0.30,
            co2_kg_per_kwh: 0.4,
            co2_kg_per_tree: 20.0,
            panel_watts: 400.0,
        }
    }
}

/// One panel configuration with its estimates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationEstimate {
    pub panels: u32,
    pub system_kw: f64,
    pub annual_kwh: f64,
    pub annual_savings: f64,
    pub cost_after_credit: f64,
    /// `None` when the configuration produces nothing.
    pub payback_years: Option<f64>,
}

/// Figures shown next to the overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightsSummary {
    pub peak_sun_hours: Option<f64>,
    pub max_panels: Option<u32>,
    pub max_array_area_m2: Option<f64>,
    pub system_capacity_kw: Option<f64>,
    pub annual_production_kwh: Option<f64>,
    pub estimated_cost_after_credit: Option<f64>,
    pub annual_savings: Option<f64>,
    pub co2_offset_kg: Option<f64>,
    pub tree_equivalent: Option<f64>,
    pub configurations: Vec<ConfigurationEstimate>,
    pub imagery_quality: Option<String>,
    pub imagery_date: Option<String>,
}

impl InsightsSummary {
    pub fn from_insights(insights: &BuildingInsights) -> Self {
        Self::with_assumptions(insights, &Assumptions::default())
    }

    pub fn with_assumptions(insights: &BuildingInsights, a: &Assumptions) -> Self {
        let mut summary = InsightsSummary {
            peak_sun_hours: insights.max_sunshine_hours().map(f64::round),
            imagery_quality: insights.imagery_quality.clone(),
            imagery_date: insights.imagery_date.map(|d| d.to_string()),
            ..Self::default()
        };

        let Some(potential) = insights.solar_potential.as_ref() else {
            return summary;
        };

        summary.max_panels = potential.max_panels();
        summary.max_array_area_m2 = potential.max_array_area_meters2;

        if let Some(watts) = potential.peak_watts() {
            summary.system_capacity_kw = Some(round_to(watts / 1000.0, 1));
            summary.estimated_cost_after_credit = Some(cost_after_credit(watts, a));
        }

        if let Some(kwh) = potential.annual_kwh() {
            let kwh = kwh.round();
            let co2 = (kwh * a.co2_kg_per_kwh).round();
            summary.annual_production_kwh = Some(kwh);
            summary.annual_savings = Some((kwh * a.electricity_rate).round());
            summary.co2_offset_kg = Some(co2);
            summary.tree_equivalent = Some((co2 / a.co2_kg_per_tree).round());
        }

        summary.configurations = potential
            .panel_configs()
            .iter()
            .map(|config| {
                let panels = config.panels();
                let annual_kwh = config.yearly_kwh().round();
                let annual_savings = (annual_kwh * a.electricity_rate).round();
                let system_watts = panels as f64 * a.panel_watts;
                let cost = cost_after_credit(system_watts, a);
                ConfigurationEstimate {
                    panels,
                    system_kw: round_to(system_watts / 1000.0, 1),
                    annual_kwh,
                    annual_savings,
                    cost_after_credit: cost,
                    payback_years: (annual_savings > 0.0).then(|| round_to(cost / annual_savings, 1)),
                }
            })
            .collect();

        summary
    }
}

fn cost_after_credit(watts: f64, a: &Assumptions) -> f64 {
    let cost = (watts * a.cost_per_watt).round();
    (cost * (1.0 - a.tax_credit)).round()
}

fn round_to(v: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (v * scale).round() / scale
}
