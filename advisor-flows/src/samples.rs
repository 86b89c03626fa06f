//! Demonstration readings for each flow, handy for dashboards and smoke runs.

use crate::actions::FormData;
use crate::catalog::{
    ALTERNATIVE_FUEL, COMBUSTION, PLANT_SUMMARY, QUALITY_CORRECTION, RAW_MATERIAL_BLEND,
    UTILITIES_LOGISTICS,
};

/// Name of the reference plant used by the demo data.
pub const DEFAULT_PLANT_NAME: &str = "JK Cement - Mangrol Plant";

const PLANT_DATA: &str = r#"{
  "timestamp": "2024-08-15T14:30:00Z",
  "kiln_temp": 1450,
  "cooler_pressure": 5.2,
  "raw_mill_power": 3200,
  "cement_mill_power": 4100,
  "clinker_production_rate": 250
}"#;

const HISTORICAL_DATA: &str = "Historical data shows a 5% increase in energy consumption during \
summer months due to higher ambient temperatures affecting cooler efficiency.";

const KPI_DATA: &str = r#"{
  "energy_consumption_kwh_per_ton": 95,
  "clinker_quality_c3s": "65%",
  "production_rate_tph": 250,
  "alternative_fuel_substitution_rate": "15%"
}"#;

const CURRENT_BLEND: &str = r#"{
  "limestone": "78%",
  "clay": "18%",
  "iron_ore": "3%",
  "bauxite": "1%"
}"#;

const PLANT_CONDITIONS: &str = "Kiln running at 98% capacity. Weather is clear, 32°C.";

const FEED_DATA: &str =
    "Real-time feed analysis: LSF=98.5, SM=2.4, AM=1.5. Moisture content at 0.8%.";

const QUALITY_TARGETS: &str = r#"{
  "target_c3s": "66%",
  "target_liteness": "90"
}"#;

const PLANT_PARAMETERS: &str = "Plant capacity: 3.0 MTPA. Current fuel: 80% coal, 20% petcoke. \
AF options: RDF, biomass, tires.";

const ENVIRONMENTAL_REGULATIONS: &str =
    "Target CO2 emission: < 0.8 tCO2/t clinker. NOx limits: 400 mg/Nm3.";

const COST_CONSTRAINTS: &str = "Coal cost: $100/ton. Petcoke cost: $120/ton. RDF cost: $30/ton.";

/// Returns a filled-in form for `flow_id`, or `None` for unknown ids.
///
/// The utilities form omits `plantName`; that field comes from the
/// configured plant preset.
#[must_use]
pub fn sample_form(flow_id: &str) -> Option<FormData> {
    let fields: &[(&str, &str)] = match flow_id {
        PLANT_SUMMARY => &[
            ("plantData", PLANT_DATA),
            ("historicalData", HISTORICAL_DATA),
            ("kpiData", KPI_DATA),
        ],
        RAW_MATERIAL_BLEND => &[
            ("feedData", FEED_DATA),
            ("currentBlend", CURRENT_BLEND),
            ("historicalData", HISTORICAL_DATA),
        ],
        COMBUSTION => &[
            ("realTimeData", PLANT_DATA),
            ("plantConditions", PLANT_CONDITIONS),
        ],
        QUALITY_CORRECTION => &[
            ("feedData", FEED_DATA),
            ("historicalData", HISTORICAL_DATA),
            ("qualityTargets", QUALITY_TARGETS),
        ],
        ALTERNATIVE_FUEL => &[
            ("plantParameters", PLANT_PARAMETERS),
            ("environmentalRegulations", ENVIRONMENTAL_REGULATIONS),
            ("costConstraints", COST_CONSTRAINTS),
        ],
        UTILITIES_LOGISTICS => &[
            ("historicalData", HISTORICAL_DATA),
            ("currentConditions", PLANT_CONDITIONS),
        ],
        _ => return None,
    };

    Some(
        fields
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;

    #[test]
    fn samples_cover_every_required_input() {
        let registry = catalog().unwrap();
        for flow in registry.iter() {
            let form = sample_form(flow.id().as_str()).expect("sample exists");
            for field in flow.input().required_fields() {
                if field == "plantName" {
                    continue;
                }
                assert!(form.contains_key(field), "{} lacks {field}", flow.id());
            }
        }
    }

    #[test]
    fn unknown_flow_has_no_sample() {
        assert!(sample_form("kiln-shell-scanner").is_none());
    }
}
