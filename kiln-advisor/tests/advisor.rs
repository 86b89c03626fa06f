use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kiln_advisor::adapters::{
    AdapterMetadata, AdapterResult, Completion, GenerationRequest, ModelAdapter,
};
use kiln_advisor::config::AdvisorConfig;
use kiln_advisor::flows::catalog::{COMBUSTION, PLANT_SUMMARY, UTILITIES_LOGISTICS};
use kiln_advisor::flows::sample_form;
use kiln_advisor::{Advisor, BootstrapError};

struct StaticAdapter {
    metadata: AdapterMetadata,
    response: String,
    prompts: Mutex<Vec<String>>,
}

impl StaticAdapter {
    fn new(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            metadata: AdapterMetadata::new("test", "static"),
            response: response.into(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelAdapter for StaticAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, request: GenerationRequest) -> AdapterResult<Completion> {
        self.prompts.lock().unwrap().push(request.prompt().to_owned());
        Ok(Completion::new(self.response.clone()))
    }
}

struct SlowAdapter {
    metadata: AdapterMetadata,
}

#[async_trait]
impl ModelAdapter for SlowAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate(&self, _request: GenerationRequest) -> AdapterResult<Completion> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Completion::new("{}"))
    }
}

#[tokio::test]
async fn sample_plant_summary_round_trip() {
    let adapter = StaticAdapter::new(
        "```json\n{\"summary\": \"Kiln stable at 1450C.\", \"anomalies\": \"None detected.\", \
         \"recommendations\": \"Hold feed rate.\"}\n```",
    );
    let advisor = Advisor::with_adapter(adapter.clone(), &AdvisorConfig::default()).unwrap();

    let form = sample_form(PLANT_SUMMARY).unwrap();
    let state = advisor.handle(PLANT_SUMMARY, &form).await.unwrap();

    assert!(!state.is_error(), "{}", state.message());
    assert_eq!(state.message(), "Report generated successfully.");
    let data = state.data().unwrap();
    assert_eq!(data.get_str("summary"), Some("Kiln stable at 1450C."));

    let prompts = adapter.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("\"kiln_temp\": 1450"));
}

#[tokio::test]
async fn configured_plant_name_reaches_the_prompt() {
    let adapter = StaticAdapter::new(
        r#"{"energyOptimizationSuggestions":"a","logisticsOptimizationSuggestions":"b",
            "predictedEnergySavings":"3%","predictedCostReduction":"2%"}"#,
    );
    let config = AdvisorConfig::from_yaml_str("plant:\n  name: Satna Works\n").unwrap();
    let advisor = Advisor::with_adapter(adapter.clone(), &config).unwrap();

    let form = sample_form(UTILITIES_LOGISTICS).unwrap();
    let state = advisor.handle(UTILITIES_LOGISTICS, &form).await.unwrap();

    assert!(!state.is_error(), "{}", state.message());
    assert!(adapter.prompts()[0].contains("Satna Works"));
}

#[tokio::test]
async fn unknown_flow_is_an_error() {
    let advisor =
        Advisor::with_adapter(StaticAdapter::new("{}"), &AdvisorConfig::default()).unwrap();
    let err = advisor
        .handle("kiln-shell-scanner", &Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BootstrapError::UnknownFlow { id } if id == "kiln-shell-scanner"));
}

#[tokio::test]
async fn configured_timeout_bounds_the_call() {
    let adapter = Arc::new(SlowAdapter {
        metadata: AdapterMetadata::new("test", "slow"),
    });
    let config = AdvisorConfig::from_yaml_str("runtime:\n  timeout_secs: 1\n").unwrap();
    let advisor = Advisor::with_adapter(adapter, &config).unwrap();

    let form = sample_form(COMBUSTION).unwrap();
    let started = std::time::Instant::now();
    let state = advisor.handle(COMBUSTION, &form).await.unwrap();

    assert!(state.is_error());
    assert_eq!(
        state.message(),
        kiln_advisor::flows::actions::TIMEOUT_MESSAGE
    );
    assert!(started.elapsed() < Duration::from_secs(4));
}
