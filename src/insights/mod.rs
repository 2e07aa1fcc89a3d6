//! LLM insight collaborator
//!
//! The engine only consumes a narrow contract: given a scenario, its top
//! recommendations and the financial context, return free-text insights plus
//! optional lists. Every call is best-effort; callers fall back to rule-based
//! text on any failure.

use crate::config::OrchestratorConfig;
use crate::models::{FinancialContext, LlmInsights, Recommendation, Scenario};
use crate::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub mod gemini;
pub use gemini::GeminiInsightProvider;

/// Trait for optional natural-language enrichment
#[async_trait]
pub trait InsightProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn request_insights(
        &self,
        scenario: &Scenario,
        top_recommendations: &[Recommendation],
        context: &FinancialContext,
    ) -> Result<LlmInsights>;
}

/// Gemini provider when a key is configured, otherwise none
pub fn provider_from_config(config: &OrchestratorConfig) -> Option<Arc<dyn InsightProvider>> {
    let key = config.gemini_api_key.as_ref()?;

    match GeminiInsightProvider::new(key.clone()) {
        Ok(provider) => {
            info!("Gemini insight provider enabled");
            Some(Arc::new(provider))
        }
        Err(e) => {
            warn!(error = %e, "Gemini client could not be built, using rule-based narratives");
            None
        }
    }
}

/// Mock provider for development & testing
/// Keeps the enrichment path exercised without network access
pub struct MockInsightProvider;

#[async_trait]
impl InsightProvider for MockInsightProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn request_insights(
        &self,
        scenario: &Scenario,
        top_recommendations: &[Recommendation],
        context: &FinancialContext,
    ) -> Result<LlmInsights> {
        let headline = top_recommendations
            .first()
            .map(|r| r.title.clone())
            .unwrap_or_else(|| scenario.name.clone());

        Ok(LlmInsights {
            insights: format!(
                "{} looks workable with {:.0} available each month.",
                headline,
                context.available_income()
            ),
            optimizations: top_recommendations
                .iter()
                .flat_map(|r| r.action_steps.first().cloned())
                .collect(),
            alternatives: top_recommendations
                .iter()
                .skip(1)
                .map(|r| r.title.clone())
                .collect(),
            risk_assessment: BTreeMap::from([
                ("risk_tolerance".to_string(), json!(context.risk_tolerance)),
                ("scenario_type".to_string(), json!(scenario.scenario_type)),
            ]),
        })
    }
}
