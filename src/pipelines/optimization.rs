//! Parameter-sweep optimization pipeline
//!
//! validate → generate_variations → evaluate_variations → rank → synthesize

use super::{AnalysisComponents, CachePolicy, Pipeline, PipelineInput, PipelineOutput};
use crate::error::ScenarioError;
use crate::graph::{node_fn, Channel, CompiledGraph, Node, StateGraph, WorkflowState};
use crate::models::{
    FinancialContext, NodeError, RankedOption, RecommendationSet, Scenario, ValidationResult,
};
use crate::ranking::variations::Variation;
use crate::ranking::EvaluatedOption;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const PHASES: [&str; 5] = [
    "validate",
    "generate_variations",
    "evaluate_variations",
    "rank",
    "synthesize",
];

pub struct OptimizationState {
    scenario: Arc<Scenario>,
    context: Arc<FinancialContext>,
    constraints: Arc<Vec<String>>,
    validation: Channel<Option<ValidationResult>>,
    variations: Channel<Vec<Variation>>,
    evaluated: Channel<Vec<EvaluatedOption>>,
    ranked: Channel<Vec<RankedOption>>,
    recommendations: Channel<Option<RecommendationSet>>,
    errors: Channel<Vec<NodeError>>,
}

impl OptimizationState {
    fn new(scenario: Arc<Scenario>, context: Arc<FinancialContext>, constraints: Arc<Vec<String>>) -> Self {
        Self {
            scenario,
            context,
            constraints,
            validation: Channel::replacing("validation"),
            variations: Channel::appending("variations"),
            evaluated: Channel::appending("evaluated"),
            ranked: Channel::replacing("ranked"),
            recommendations: Channel::replacing("recommendations"),
            errors: Channel::appending("errors"),
        }
    }

    fn summary(&self) -> String {
        match self.ranked.get().first() {
            Some(best) => format!(
                "{}: {} variant(s) ranked, best is {} at {:.1}",
                self.scenario.name,
                self.ranked.get().len(),
                best.variant_label,
                best.composite_score
            ),
            None => format!("{}: no variant could be ranked", self.scenario.name),
        }
    }

    fn into_data(self) -> Result<Value> {
        let labels: Vec<String> = self
            .variations
            .get()
            .iter()
            .map(|v| v.label.clone())
            .collect();
        let ranked = self.ranked.into_inner();

        Ok(json!({
            "scenario_id": self.scenario.id,
            "constraints": self.constraints.as_ref(),
            "validation": serde_json::to_value(self.validation.into_inner())?,
            "variations": labels,
            "best_option": serde_json::to_value(ranked.first())?,
            "ranked_options": serde_json::to_value(&ranked)?,
            "recommendations": serde_json::to_value(self.recommendations.into_inner())?,
            "errors": serde_json::to_value(self.errors.into_inner())?,
        }))
    }
}

#[derive(Default)]
pub struct OptimizationUpdate {
    validation: Option<ValidationResult>,
    variations: Option<Vec<Variation>>,
    evaluated: Option<Vec<EvaluatedOption>>,
    ranked: Option<Vec<RankedOption>>,
    recommendations: Option<RecommendationSet>,
}

impl WorkflowState for OptimizationState {
    type Update = OptimizationUpdate;

    fn apply(&mut self, update: OptimizationUpdate) {
        if let Some(validation) = update.validation {
            self.validation.merge(Some(validation));
        }
        if let Some(variations) = update.variations {
            self.variations.merge(variations);
        }
        if let Some(evaluated) = update.evaluated {
            self.evaluated.merge(evaluated);
        }
        if let Some(ranked) = update.ranked {
            self.ranked.merge(ranked);
        }
        if let Some(recommendations) = update.recommendations {
            self.recommendations.merge(Some(recommendations));
        }
    }

    fn record_error(&mut self, error: NodeError) {
        self.errors.merge(vec![error]);
    }
}

struct SynthesizeNode {
    components: Arc<AnalysisComponents>,
}

#[async_trait]
impl Node<OptimizationState> for SynthesizeNode {
    fn name(&self) -> &'static str {
        "synthesize"
    }

    async fn run(&self, state: &OptimizationState) -> Result<OptimizationUpdate> {
        let synthesizer = &self.components.synthesizer;
        let records = synthesizer.from_ranked(&state.scenario, state.ranked.get());
        let set = synthesizer.synthesize(&state.scenario, records, &state.context).await;

        Ok(OptimizationUpdate {
            recommendations: Some(set),
            ..OptimizationUpdate::default()
        })
    }
}

fn build_graph(components: Arc<AnalysisComponents>) -> Result<CompiledGraph<OptimizationState>> {
    let mut graph = StateGraph::new("scenario_optimization");

    let c = Arc::clone(&components);
    graph.add_node(node_fn("validate", move |state: &OptimizationState| -> Result<OptimizationUpdate> {
        let result = c.validator.validate(&state.scenario, Some(state.context.as_ref()));
        if !result.is_valid {
            warn!(
                scenario_id = %state.scenario.id,
                errors = result.errors.len(),
                "Optimizing an invalid base scenario"
            );
        }
        Ok(OptimizationUpdate {
            validation: Some(result),
            ..OptimizationUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("generate_variations", move |state: &OptimizationState| -> Result<OptimizationUpdate> {
        Ok(OptimizationUpdate {
            variations: Some(c.generator.generate(&state.scenario)),
            ..OptimizationUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("evaluate_variations", move |state: &OptimizationState| -> Result<OptimizationUpdate> {
        let evaluated = state
            .variations
            .get()
            .iter()
            .map(|variation| c.ranker.evaluate(&variation.scenario, &variation.label, &state.context))
            .collect();

        Ok(OptimizationUpdate {
            evaluated: Some(evaluated),
            ..OptimizationUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("rank", move |state: &OptimizationState| -> Result<OptimizationUpdate> {
        if state.evaluated.get().is_empty() {
            return Err(ScenarioError::node("rank", "no evaluated variations to rank"));
        }

        Ok(OptimizationUpdate {
            ranked: Some(c.ranker.rank(state.evaluated.get().clone(), &state.constraints)),
            ..OptimizationUpdate::default()
        })
    }));

    graph.add_node(SynthesizeNode { components });
    graph.chain(&PHASES);
    graph.compile()
}

/// Sweeps the base scenario's amounts and ranks the variants
pub struct ScenarioOptimizationPipeline {
    graph: CompiledGraph<OptimizationState>,
}

impl ScenarioOptimizationPipeline {
    pub fn new(components: Arc<AnalysisComponents>) -> Result<Self> {
        Ok(Self {
            graph: build_graph(components)?,
        })
    }
}

#[async_trait]
impl Pipeline for ScenarioOptimizationPipeline {
    fn name(&self) -> &'static str {
        "scenario_optimization"
    }

    fn phases(&self) -> Vec<&'static str> {
        self.graph.phase_names()
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Ttl
    }

    fn check_input(&self, input: &PipelineInput) -> Result<()> {
        input.require_scenario()?;
        input.require_context()?;
        Ok(())
    }

    async fn run(&self, input: Arc<PipelineInput>, run_id: Uuid) -> Result<PipelineOutput> {
        let scenario = Arc::new(input.require_scenario()?.clone());
        let context = Arc::new(input.require_context()?.clone());
        let constraints = Arc::new(input.constraints.clone());

        info!(
            run_id = %run_id,
            scenario_id = %scenario.id,
            constraints = constraints.len(),
            "Scenario optimization starting"
        );

        let state = OptimizationState::new(scenario, context, constraints);
        let outcome = self.graph.invoke(state, run_id).await;

        Ok(PipelineOutput {
            summary: outcome.state.summary(),
            data: outcome.state.into_data()?,
            metadata: outcome.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::models::{RecommendationKind, ScenarioType};

    fn pipeline() -> ScenarioOptimizationPipeline {
        let config = OrchestratorConfig {
            monte_carlo_seed: Some(11),
            ..OrchestratorConfig::default()
        };
        ScenarioOptimizationPipeline::new(Arc::new(AnalysisComponents::new(&config, None))).unwrap()
    }

    fn input() -> PipelineInput {
        PipelineInput::for_scenario(
            Scenario::new("inv", "Index fund", ScenarioType::Investment)
                .with_param("monthlyContribution", 400)
                .with_param("expectedReturn", 0.07),
            FinancialContext::new(12_000.0, 6_500.0, 4_500.0),
        )
    }

    #[tokio::test]
    async fn test_ranks_every_variation() {
        let output = pipeline().run(Arc::new(input()), Uuid::new_v4()).await.unwrap();

        let ranked = output.data["ranked_options"].as_array().unwrap();
        assert_eq!(ranked.len(), 3);
        let ranks: Vec<u64> = ranked.iter().map(|r| r["rank"].as_u64().unwrap()).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(output.data["best_option"], ranked[0]);

        let kinds = &output.data["recommendations"]["recommendations"];
        assert_eq!(
            kinds[0]["kind"],
            serde_json::to_value(RecommendationKind::Primary).unwrap()
        );
        assert_eq!(kinds.as_array().unwrap().len(), 3);
        assert!(output.summary.contains("3 variant(s) ranked"));
    }

    #[tokio::test]
    async fn test_constraints_are_carried() {
        let input = input().with_constraints(vec!["risk-averse".to_string()]);
        let output = pipeline().run(Arc::new(input), Uuid::new_v4()).await.unwrap();

        assert_eq!(output.data["constraints"][0], "risk-averse");
        assert!(output.data["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_phases_and_policy() {
        let pipeline = pipeline();
        assert_eq!(pipeline.phases(), PHASES.to_vec());
        assert_eq!(pipeline.cache_policy(), CachePolicy::Ttl);
    }
}
