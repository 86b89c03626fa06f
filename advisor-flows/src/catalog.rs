//! Definitions of the six plant advisory flows.

use std::sync::{Arc, OnceLock};

use advisor_engine::{DefinitionError, FlowDefinition, FlowRegistry, RegistryError};
use advisor_primitives::{Contract, FieldSpec, FlowId, Record};
use serde_json::Value;
use thiserror::Error;

/// Plant status summary with anomaly detection.
pub const PLANT_SUMMARY: &str = "plant-summary";
/// Raw material blend optimisation.
pub const RAW_MATERIAL_BLEND: &str = "raw-material-blend";
/// Clinkerisation combustion tuning.
pub const COMBUSTION: &str = "combustion";
/// Proactive quality corrections.
pub const QUALITY_CORRECTION: &str = "quality-correction";
/// Alternative fuel mix optimisation.
pub const ALTERNATIVE_FUEL: &str = "alternative-fuel";
/// Utilities and internal logistics optimisation.
pub const UTILITIES_LOGISTICS: &str = "utilities-logistics";

const BLEND_TOLERANCE: f64 = 0.1;

/// Errors raised while assembling the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A contract or identifier is invalid.
    #[error(transparent)]
    Primitive(#[from] advisor_primitives::Error),
    /// A template does not match its input contract.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    /// Two flows share an id.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A standard flow is absent from the supplied registry.
    #[error("flow `{id}` is not registered")]
    MissingFlow {
        /// Expected flow id.
        id: String,
    },
}

/// Result alias for catalog construction.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Builds a fresh registry holding every flow.
///
/// # Errors
///
/// Fails only if a definition is inconsistent, which indicates a defect in
/// this module rather than bad input.
pub fn catalog() -> CatalogResult<Arc<FlowRegistry>> {
    Ok(FlowRegistry::builder()
        .register(plant_summary()?)?
        .register(raw_material_blend()?)?
        .register(combustion()?)?
        .register(quality_correction()?)?
        .register(alternative_fuel()?)?
        .register(utilities_logistics()?)?
        .build())
}

/// Process-wide registry, built on first use and shared afterwards.
///
/// # Errors
///
/// Propagates [`catalog`] errors; a failed build is not cached.
pub fn shared_catalog() -> CatalogResult<Arc<FlowRegistry>> {
    static CATALOG: OnceLock<Arc<FlowRegistry>> = OnceLock::new();

    if let Some(registry) = CATALOG.get() {
        return Ok(Arc::clone(registry));
    }
    let built = catalog()?;
    Ok(Arc::clone(CATALOG.get_or_init(|| built)))
}

fn id(value: &str) -> CatalogResult<FlowId> {
    Ok(FlowId::new(value)?)
}

fn plant_summary() -> CatalogResult<FlowDefinition> {
    let input = Contract::from_fields([
        FieldSpec::string("plantData", "Real-time sensor data from the cement plant."),
        FieldSpec::string("historicalData", "Historical data for the past 10 years."),
        FieldSpec::string("kpiData", "Key performance indicators data."),
    ])?;
    let output = Contract::from_fields([
        FieldSpec::string("summary", "A summary of the current plant status and KPIs."),
        FieldSpec::string("anomalies", "Detected anomalies in the plant operations."),
        FieldSpec::string(
            "recommendations",
            "Recommendations for addressing the detected anomalies and improving efficiency.",
        ),
    ])?;

    Ok(FlowDefinition::builder(id(PLANT_SUMMARY)?, input, output)
        .title("Cement plant GPT")
        .format_instructions(
            "Output should be structured as follows:\n\
             Summary: [Summary of current plant status and KPIs]\n\
             Anomalies: [Detected anomalies in plant operations]\n\
             Recommendations: [Recommendations for addressing anomalies and improving efficiency]",
        )
        .template(
            "You are an AI assistant providing support to a cement plant supervisor.\n\
             You will receive real-time plant data, historical data, and KPI data.\n\
             Your task is to:\n\
             1. Summarize the current plant status and KPIs.\n\
             2. Identify any anomalies in the plant operations based on the data provided.\n\
             3. Provide recommendations for addressing the detected anomalies and improving efficiency.\n\n\
             Real-time Plant Data: {{{plantData}}}\n\
             Historical Data: {{{historicalData}}}\n\
             KPI Data: {{{kpiData}}}",
        )?)
}

fn raw_material_blend() -> CatalogResult<FlowDefinition> {
    let input = Contract::from_fields([
        FieldSpec::string("feedData", "Real-time feed data from the cement plant."),
        FieldSpec::string("currentBlend", "The current raw material blend composition."),
        FieldSpec::string(
            "historicalData",
            "Historical data of raw material blends and their performance.",
        ),
    ])?;
    let output = Contract::from_fields([
        FieldSpec::string(
            "optimizedBlend",
            "The optimized raw material blend composition recommended by the AI, as a JSON \
             object mapping each material to its percentage.",
        ),
        FieldSpec::number(
            "predictedEnergySavings",
            "The predicted energy savings from using the optimized blend, in kWh.",
        ),
        FieldSpec::string(
            "predictedQualityImprovement",
            "The predicted improvement in product quality from using the optimized blend.",
        ),
        FieldSpec::string("reasoning", "The AI's reasoning for the recommended blend."),
    ])?;

    Ok(FlowDefinition::builder(id(RAW_MATERIAL_BLEND)?, input, output)
        .title("Raw material blend optimization")
        .format_instructions("The optimizedBlend percentages must add up to exactly 100.")
        .output_check(check_blend_total)
        .template(
            "You are an expert in cement plant operations, specializing in optimizing raw \
             material blends for energy efficiency and product quality.\n\
             Analyze the real-time feed data, current blend, and historical data to recommend \
             an optimized raw material blend.\n\
             Explain the reasoning for the recommended blend, and predict the energy savings \
             and product quality improvement.\n\n\
             Real-time Feed Data: {{{feedData}}}\n\
             Current Blend: {{{currentBlend}}}\n\
             Historical Data: {{{historicalData}}}",
        )?)
}

fn combustion() -> CatalogResult<FlowDefinition> {
    let input = Contract::from_fields([
        FieldSpec::string("realTimeData", "Real-time sensor data from the clinkerization process."),
        FieldSpec::string("plantConditions", "Description of current plant conditions."),
    ])?;
    let output = Contract::from_fields([
        FieldSpec::string(
            "controlAdjustments",
            "Recommended adjustments to combustion controls to optimize energy use and reduce \
             environmental impact.",
        ),
        FieldSpec::string(
            "energyDemandReduction",
            "Estimated reduction in energy demand as a result of the adjustments.",
        ),
        FieldSpec::string(
            "environmentalImpactReduction",
            "Estimated reduction in environmental impact as a result of the adjustments.",
        ),
    ])?;

    Ok(FlowDefinition::builder(id(COMBUSTION)?, input, output)
        .title("Combustion optimization")
        .format_instructions(
            "Format your response as follows:\n\
             Control Adjustments: [Specific control adjustments]\n\
             Energy Demand Reduction: [Estimated energy demand reduction]\n\
             Environmental Impact Reduction: [Estimated environmental impact reduction]",
        )
        .template(
            "You are an expert in cement plant clinkerization process optimization.\n\
             Based on the real-time sensor data and plant conditions, provide specific \
             adjustments to combustion controls to lower energy demand and reduce \
             environmental impact.\n\n\
             Real-time Data: {{{realTimeData}}}\n\
             Plant Conditions: {{{plantConditions}}}\n\n\
             Ensure your recommendations are clear and actionable.",
        )?)
}

fn quality_correction() -> CatalogResult<FlowDefinition> {
    let input = Contract::from_fields([
        FieldSpec::string("feedData", "Real-time feed data from the cement plant processes."),
        FieldSpec::string("historicalData", "Historical data of cement production parameters."),
        FieldSpec::string("qualityTargets", "Target quality parameters for the cement product."),
    ])?;
    let output = Contract::from_fields([
        FieldSpec::string("analysis", "Analysis of the input data and detected fluctuations."),
        FieldSpec::string(
            "suggestedCorrections",
            "Suggested proactive quality corrections to maintain product quality.",
        ),
    ])?;

    Ok(FlowDefinition::builder(id(QUALITY_CORRECTION)?, input, output)
        .title("Proactive quality corrections")
        .format_instructions("Analysis:\nSuggested Corrections:")
        .template(
            "You are an expert in cement production quality control. Analyze the real-time \
             feed data, historical data, and quality targets to detect fluctuations and suggest \
             proactive quality corrections.\n\n\
             Real-time Feed Data: {{{feedData}}}\n\
             Historical Data: {{{historicalData}}}\n\
             Quality Targets: {{{qualityTargets}}}\n\n\
             Based on this information, provide an analysis of the detected fluctuations and \
             suggest proactive quality corrections to maintain consistent product quality. \
             Focus on actionable steps that can be taken in real-time to adjust the production \
             process.",
        )?)
}

fn alternative_fuel() -> CatalogResult<FlowDefinition> {
    let input = Contract::from_fields([
        FieldSpec::string(
            "plantParameters",
            "A description of the cement plant parameters, including current fuel consumption, \
             alternative fuel options, and production goals.",
        ),
        FieldSpec::string(
            "environmentalRegulations",
            "A description of the relevant environmental regulations and sustainability targets.",
        ),
        FieldSpec::string(
            "costConstraints",
            "A description of the cost constraints and economic factors.",
        ),
    ])?;
    let output = Contract::from_fields([
        FieldSpec::string(
            "fuelCombinationRecommendation",
            "Recommended fuel combination and thermal substitution rates.",
        ),
        FieldSpec::string(
            "energyEfficiencyImprovement",
            "Expected energy efficiency improvement with the recommended fuel combination.",
        ),
        FieldSpec::string(
            "emissionReductionEstimate",
            "Estimated emission reduction with the recommended fuel combination.",
        ),
        FieldSpec::string("costAnalysis", "Cost analysis of the recommended fuel combination."),
    ])?;

    Ok(FlowDefinition::builder(id(ALTERNATIVE_FUEL)?, input, output)
        .title("Alternative fuel optimization")
        .template(
            "You are an expert in cement plant operations and sustainability. Your goal is to \
             recommend the optimal alternative fuel combination for a cement plant, considering \
             various factors such as plant parameters, environmental regulations, and cost \
             constraints.\n\n\
             Analyze the following information:\n\n\
             Plant Parameters: {{{plantParameters}}}\n\
             Environmental Regulations: {{{environmentalRegulations}}}\n\
             Cost Constraints: {{{costConstraints}}}\n\n\
             Based on your analysis, provide the following:\n\
             - Recommended fuel combination and thermal substitution rates.\n\
             - Expected energy efficiency improvement with the recommended fuel combination.\n\
             - Estimated emission reduction with the recommended fuel combination.\n\
             - Cost analysis of the recommended fuel combination.",
        )?)
}

fn utilities_logistics() -> CatalogResult<FlowDefinition> {
    let input = Contract::from_fields([
        FieldSpec::string("plantName", "The name of the cement plant."),
        FieldSpec::string(
            "historicalData",
            "Historical data of energy consumption, material flow, and logistics.",
        ),
        FieldSpec::string("currentConditions", "Current operational conditions of the plant."),
    ])?;
    let output = Contract::from_fields([
        FieldSpec::string(
            "energyOptimizationSuggestions",
            "Suggestions for optimizing energy consumption in plant utilities.",
        ),
        FieldSpec::string(
            "logisticsOptimizationSuggestions",
            "Suggestions for optimizing internal logistics flows.",
        ),
        FieldSpec::string(
            "predictedEnergySavings",
            "Predicted energy savings from implementing the suggestions.",
        ),
        FieldSpec::string(
            "predictedCostReduction",
            "Predicted cost reduction from implementing the suggestions.",
        ),
    ])?;

    Ok(FlowDefinition::builder(id(UTILITIES_LOGISTICS)?, input, output)
        .title("Utilities and material handling optimization")
        .template(
            "You are an expert in cement plant operations, specializing in optimizing energy \
             consumption and logistics.\n\
             Based on the provided historical data and current conditions of the plant, provide \
             suggestions for optimizing energy consumption in plant utilities and optimizing \
             internal logistics flows.\n\
             Also, predict the energy savings and cost reduction from implementing these \
             suggestions.\n\n\
             Plant Name: {{{plantName}}}\n\
             Historical Data: {{{historicalData}}}\n\
             Current Conditions: {{{currentConditions}}}\n\n\
             Consider all aspects of plant operations, including utilities like compressed air, \
             water, and electricity, as well as material handling processes.\n\
             Give clear and actionable advice that can be implemented by the plant management.",
        )?)
}

/// The recommended blend must be a JSON object of percentages totalling 100.
fn check_blend_total(output: &Record) -> Result<(), String> {
    let blend = output
        .get_str("optimizedBlend")
        .ok_or("optimizedBlend is not text")?;
    let parsed: Value = serde_json::from_str(blend)
        .map_err(|err| format!("optimizedBlend is not valid JSON: {err}"))?;
    let Value::Object(components) = parsed else {
        return Err("optimizedBlend is not a JSON object".to_owned());
    };
    if components.is_empty() {
        return Err("optimizedBlend lists no materials".to_owned());
    }

    let mut total = 0.0;
    for (material, share) in &components {
        total += percentage(share)
            .ok_or_else(|| format!("optimizedBlend share for `{material}` is not a percentage"))?;
    }

    if (total - 100.0).abs() > BLEND_TOLERANCE {
        return Err(format!("optimizedBlend sums to {total}, expected 100"));
    }
    Ok(())
}

fn percentage(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    }
    .filter(|share: &f64| share.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_holds_six_flows_in_order() {
        let registry = catalog().unwrap();
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            [
                PLANT_SUMMARY,
                RAW_MATERIAL_BLEND,
                COMBUSTION,
                QUALITY_CORRECTION,
                ALTERNATIVE_FUEL,
                UTILITIES_LOGISTICS
            ]
        );
    }

    #[test]
    fn contracts_match_capability_table() {
        let registry = catalog().unwrap();
        let fields = |id: &str, output: bool| -> Vec<String> {
            let flow = registry.get(id).unwrap();
            let contract = if output { flow.output() } else { flow.input() };
            contract.fields().iter().map(|f| f.name().to_owned()).collect()
        };

        assert_eq!(
            fields(RAW_MATERIAL_BLEND, false),
            ["feedData", "currentBlend", "historicalData"]
        );
        assert_eq!(
            fields(RAW_MATERIAL_BLEND, true),
            [
                "optimizedBlend",
                "predictedEnergySavings",
                "predictedQualityImprovement",
                "reasoning"
            ]
        );
        assert_eq!(
            fields(UTILITIES_LOGISTICS, false),
            ["plantName", "historicalData", "currentConditions"]
        );
        assert_eq!(fields(QUALITY_CORRECTION, true), ["analysis", "suggestedCorrections"]);
    }

    #[test]
    fn shared_catalog_is_a_singleton() {
        let first = shared_catalog().unwrap();
        let second = shared_catalog().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn blend_totals() {
        let ok = Record::new().with(
            "optimizedBlend",
            r#"{"limestone":"78%","clay":17.5,"iron_ore":"3.5","bauxite":1}"#,
        );
        assert!(check_blend_total(&ok).is_ok());

        let close = Record::new().with("optimizedBlend", r#"{"a":33.33,"b":33.33,"c":33.33}"#);
        assert!(check_blend_total(&close).is_ok());

        let short = Record::new().with("optimizedBlend", r#"{"limestone":70,"clay":20}"#);
        assert!(check_blend_total(&short).unwrap_err().contains("sums to 90"));

        let prose = Record::new().with("optimizedBlend", "70% limestone, 30% clay");
        assert!(check_blend_total(&prose).is_err());
    }
}
