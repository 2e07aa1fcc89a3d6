//! Gemini-backed insight provider
//!
//! Uses a long-lived reqwest::Client for connection pooling and asks the
//! model for a JSON document matching `LlmInsights`.

use super::InsightProvider;
use crate::error::ScenarioError;
use crate::models::{FinancialContext, LlmInsights, Recommendation, Scenario};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

const GEMINI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

const SYSTEM_PROMPT: &str = r#"You are a personal finance analyst reviewing a proposed financial scenario.
Respond with a single JSON object with keys:
"insights" (string), "optimizations" (array of strings),
"alternatives" (array of strings), "riskAssessment" (object)."#;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiInsightProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiInsightProvider {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl InsightProvider for GeminiInsightProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn request_insights(
        &self,
        scenario: &Scenario,
        top_recommendations: &[Recommendation],
        context: &FinancialContext,
    ) -> Result<LlmInsights> {
        if self.api_key.is_empty() {
            return Err(ScenarioError::Collaborator(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "scenario": scenario,
            "topRecommendations": top_recommendations,
            "financialContext": context,
        });

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: payload.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
                response_mime_type: "application/json".to_string(),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        info!(scenario_id = %scenario.id, "Requesting Gemini insights");

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini request failed: {}", e);
                ScenarioError::Collaborator(format!("Gemini request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini error response: {}", error_text);
            return Err(ScenarioError::Collaborator(format!(
                "Gemini returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            ScenarioError::Collaborator(format!("Gemini parse error: {}", e))
        })?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| ScenarioError::Collaborator("Empty response from Gemini".to_string()))?;

        parse_insights(text)
    }
}

/// Parse the model's JSON document, tolerating a fenced code block
fn parse_insights(text: &str) -> Result<LlmInsights> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let wire: InsightsWire = serde_json::from_str(body.trim())?;
    if wire.insights.trim().is_empty() {
        return Err(ScenarioError::Collaborator(
            "Gemini returned no insight text".to_string(),
        ));
    }

    Ok(LlmInsights {
        insights: wire.insights,
        optimizations: wire.optimizations,
        alternatives: wire.alternatives,
        risk_assessment: wire.risk_assessment,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightsWire {
    #[serde(default)]
    insights: String,
    #[serde(default)]
    optimizations: Vec<String>,
    #[serde(default)]
    alternatives: Vec<String>,
    #[serde(default, alias = "risk_assessment")]
    risk_assessment: std::collections::BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    response_mime_type: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
