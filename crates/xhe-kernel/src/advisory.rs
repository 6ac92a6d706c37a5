//! Advisory language-model collaborator.
//!
//! Advice is informational only. Nothing it returns feeds back into pulse
//! admission, and every failure comes back as an unsuccessful [`Advice`]
//! rather than an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use xhe_core::now_millis;

pub const EXPLAIN_MODEL: &str = "llama2";
pub const SIMULATE_MODEL: &str = "mistral";
pub const ANOMALY_MODEL: &str = "phi";

const UNAVAILABLE: &str = "AI agent not available";

/// Outcome of an advisory query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Always true.
    pub advisory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Advice {
    pub fn answered(model: &str, response: impl Into<String>) -> Self {
        Self {
            success: true,
            response: Some(response.into()),
            error: None,
            advisory: true,
            model: Some(model.to_owned()),
            timestamp: Some(now_millis()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
            advisory: true,
            model: None,
            timestamp: None,
        }
    }

    pub fn unavailable() -> Self {
        Self::failed(UNAVAILABLE)
    }
}

#[async_trait]
pub trait AdvisoryService: Send + Sync {
    /// Whether the model endpoint answered its last probe.
    async fn available(&self) -> bool;

    /// Names of the models the endpoint offers. Empty when unreachable.
    async fn list_models(&self) -> Vec<String>;

    async fn generate(&self, model: &str, prompt: &str) -> Advice;

    async fn explain(&self, topic: &str) -> Advice {
        let prompt = format!(
            "As a sovereign identity system advisor, explain the following concept concisely: {}",
            topic
        );
        self.generate(EXPLAIN_MODEL, &prompt).await
    }

    async fn simulate(&self, scenario: &str) -> Advice {
        let prompt = format!(
            "Simulate the following scenario in a sovereign identity system and describe potential outcomes: {}",
            scenario
        );
        self.generate(SIMULATE_MODEL, &prompt).await
    }

    async fn flag_anomalies(&self, data: &Value) -> Advice {
        let prompt = format!(
            "Analyze this data for potential anomalies or security concerns in a sovereign identity context: {}",
            data
        );
        self.generate(ANOMALY_MODEL, &prompt).await
    }
}

/// Advisor for nodes without a model client. Never available.
///
/// The configured endpoint is kept for reporting only; no request is made.
#[derive(Debug, Clone)]
pub struct OfflineAdvisor {
    endpoint: String,
}

impl OfflineAdvisor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AdvisoryService for OfflineAdvisor {
    async fn available(&self) -> bool {
        false
    }

    async fn list_models(&self) -> Vec<String> {
        Vec::new()
    }

    async fn generate(&self, _model: &str, _prompt: &str) -> Advice {
        Advice::unavailable()
    }
}
