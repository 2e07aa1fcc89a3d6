//! Side-by-side comparison of caller-supplied scenarios
//!
//! validate_all → evaluate → rank → synthesize

use super::{AnalysisComponents, CachePolicy, Pipeline, PipelineInput, PipelineOutput};
use crate::error::ScenarioError;
use crate::graph::{node_fn, Channel, CompiledGraph, Node, StateGraph, WorkflowState};
use crate::models::{
    FinancialContext, NodeError, RankedOption, RecommendationSet, Scenario, ValidationResult,
};
use crate::ranking::EvaluatedOption;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const PHASES: [&str; 4] = ["validate_all", "evaluate", "rank", "synthesize"];

pub struct ComparisonState {
    scenarios: Arc<Vec<Scenario>>,
    context: Arc<FinancialContext>,
    constraints: Arc<Vec<String>>,
    validations: Channel<BTreeMap<String, ValidationResult>>,
    evaluated: Channel<Vec<EvaluatedOption>>,
    excluded: Channel<Vec<String>>,
    ranked: Channel<Vec<RankedOption>>,
    recommendations: Channel<Option<RecommendationSet>>,
    errors: Channel<Vec<NodeError>>,
}

impl ComparisonState {
    fn new(scenarios: Arc<Vec<Scenario>>, context: Arc<FinancialContext>, constraints: Arc<Vec<String>>) -> Self {
        Self {
            scenarios,
            context,
            constraints,
            validations: Channel::records("validations"),
            evaluated: Channel::appending("evaluated"),
            excluded: Channel::appending("excluded"),
            ranked: Channel::replacing("ranked"),
            recommendations: Channel::replacing("recommendations"),
            errors: Channel::appending("errors"),
        }
    }

    fn summary(&self) -> String {
        let mut out = format!("Compared {} scenario(s)", self.scenarios.len());
        if let Some(best) = self.ranked.get().first() {
            out.push_str(&format!(
                "; {} leads at {:.1}",
                best.scenario.name, best.composite_score
            ));
        }
        if !self.excluded.get().is_empty() {
            out.push_str(&format!("; {} excluded as invalid", self.excluded.get().len()));
        }
        out
    }

    fn into_data(self) -> Result<Value> {
        Ok(json!({
            "scenario_ids": self.scenarios.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "validations": serde_json::to_value(self.validations.into_inner())?,
            "excluded": self.excluded.into_inner(),
            "ranked_options": serde_json::to_value(self.ranked.into_inner())?,
            "recommendations": serde_json::to_value(self.recommendations.into_inner())?,
            "errors": serde_json::to_value(self.errors.into_inner())?,
        }))
    }
}

#[derive(Default)]
pub struct ComparisonUpdate {
    validations: Option<BTreeMap<String, ValidationResult>>,
    evaluated: Option<Vec<EvaluatedOption>>,
    excluded: Option<Vec<String>>,
    ranked: Option<Vec<RankedOption>>,
    recommendations: Option<RecommendationSet>,
}

impl WorkflowState for ComparisonState {
    type Update = ComparisonUpdate;

    fn apply(&mut self, update: ComparisonUpdate) {
        if let Some(validations) = update.validations {
            self.validations.merge(validations);
        }
        if let Some(evaluated) = update.evaluated {
            self.evaluated.merge(evaluated);
        }
        if let Some(excluded) = update.excluded {
            self.excluded.merge(excluded);
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
impl Node<ComparisonState> for SynthesizeNode {
    fn name(&self) -> &'static str {
        "synthesize"
    }

    async fn run(&self, state: &ComparisonState) -> Result<ComparisonUpdate> {
        let ranked = state.ranked.get();
        let anchor = ranked
            .first()
            .map(|r| &r.scenario)
            .or_else(|| state.scenarios.first())
            .ok_or_else(|| ScenarioError::node("synthesize", "nothing to recommend"))?;

        let synthesizer = &self.components.synthesizer;
        let records = synthesizer.from_ranked(anchor, ranked);
        let set = synthesizer.synthesize(anchor, records, &state.context).await;

        Ok(ComparisonUpdate {
            recommendations: Some(set),
            ..ComparisonUpdate::default()
        })
    }
}

fn build_graph(components: Arc<AnalysisComponents>) -> Result<CompiledGraph<ComparisonState>> {
    let mut graph = StateGraph::new("scenario_comparison");

    let c = Arc::clone(&components);
    graph.add_node(node_fn("validate_all", move |state: &ComparisonState| -> Result<ComparisonUpdate> {
        let validations = state
            .scenarios
            .iter()
            .map(|scenario| {
                (
                    scenario.id.clone(),
                    c.validator.validate(scenario, Some(state.context.as_ref())),
                )
            })
            .collect();

        Ok(ComparisonUpdate {
            validations: Some(validations),
            ..ComparisonUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("evaluate", move |state: &ComparisonState| -> Result<ComparisonUpdate> {
        let validations = state.validations.get();
        let (valid, invalid): (Vec<&Scenario>, Vec<&Scenario>) = state
            .scenarios
            .iter()
            .partition(|s| validations.get(&s.id).map_or(true, |v| v.is_valid));

        debug!(valid = valid.len(), invalid = invalid.len(), "Evaluating scenarios");

        let evaluated = valid
            .into_iter()
            .map(|scenario| c.ranker.evaluate(scenario, &scenario.id, &state.context))
            .collect();

        Ok(ComparisonUpdate {
            evaluated: Some(evaluated),
            excluded: Some(invalid.into_iter().map(|s| s.id.clone()).collect()),
            ..ComparisonUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("rank", move |state: &ComparisonState| -> Result<ComparisonUpdate> {
        if state.evaluated.get().is_empty() {
            return Err(ScenarioError::node("rank", "no valid scenario to rank"));
        }

        Ok(ComparisonUpdate {
            ranked: Some(c.ranker.rank(state.evaluated.get().clone(), &state.constraints)),
            ..ComparisonUpdate::default()
        })
    }));

    graph.add_node(SynthesizeNode { components });
    graph.chain(&PHASES);
    graph.compile()
}

/// Ranks several independent scenarios against the same finances
pub struct ScenarioComparisonPipeline {
    graph: CompiledGraph<ComparisonState>,
}

impl ScenarioComparisonPipeline {
    pub fn new(components: Arc<AnalysisComponents>) -> Result<Self> {
        Ok(Self {
            graph: build_graph(components)?,
        })
    }
}

#[async_trait]
impl Pipeline for ScenarioComparisonPipeline {
    fn name(&self) -> &'static str {
        "scenario_comparison"
    }

    fn phases(&self) -> Vec<&'static str> {
        self.graph.phase_names()
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Lru
    }

    fn check_input(&self, input: &PipelineInput) -> Result<()> {
        if input.scenarios.is_empty() {
            return Err(ScenarioError::MissingInput("scenarios".to_string()));
        }
        input.require_context()?;
        Ok(())
    }

    async fn run(&self, input: Arc<PipelineInput>, run_id: Uuid) -> Result<PipelineOutput> {
        self.check_input(&input)?;

        let scenarios = Arc::new(input.scenarios.clone());
        let context = Arc::new(input.require_context()?.clone());
        let constraints = Arc::new(input.constraints.clone());

        info!(run_id = %run_id, scenarios = scenarios.len(), "Scenario comparison starting");

        let state = ComparisonState::new(scenarios, context, constraints);
        let outcome = self.graph.invoke(state, run_id).await;

        Ok(PipelineOutput {
            summary: outcome.state.summary(),
            data: outcome.state.into_data()?,
            metadata: outcome.metadata,
        })
    }
}
