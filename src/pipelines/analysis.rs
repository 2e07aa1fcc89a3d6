//! Single-scenario analysis pipeline
//!
//! validate → calculate_effects → analyze_conflicts → simulate →
//! assess_feasibility → synthesize

use super::{AnalysisComponents, CachePolicy, Pipeline, PipelineInput, PipelineOutput};
use crate::error::ScenarioError;
use crate::graph::{node_fn, Channel, CompiledGraph, Node, StateGraph, WorkflowState};
use crate::models::{
    ConflictAnalysis, FeasibilityAssessment, FinancialContext, FinancialEffects, MonteCarloResult,
    NodeError, RecommendationSet, Scenario, ValidationResult,
};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const PHASES: [&str; 6] = [
    "validate",
    "calculate_effects",
    "analyze_conflicts",
    "simulate",
    "assess_feasibility",
    "synthesize",
];

pub struct AnalysisState {
    scenario: Arc<Scenario>,
    context: Arc<FinancialContext>,
    validation: Channel<Option<ValidationResult>>,
    effects: Channel<Option<FinancialEffects>>,
    conflicts: Channel<Option<ConflictAnalysis>>,
    simulation: Channel<Option<MonteCarloResult>>,
    feasibility: Channel<Option<FeasibilityAssessment>>,
    recommendations: Channel<Option<RecommendationSet>>,
    /// Headline figures collected along the way
    highlights: Channel<BTreeMap<String, Value>>,
    errors: Channel<Vec<NodeError>>,
}

impl AnalysisState {
    fn new(scenario: Arc<Scenario>, context: Arc<FinancialContext>) -> Self {
        Self {
            scenario,
            context,
            validation: Channel::replacing("validation"),
            effects: Channel::replacing("effects"),
            conflicts: Channel::replacing("conflicts"),
            simulation: Channel::replacing("simulation"),
            feasibility: Channel::replacing("feasibility"),
            recommendations: Channel::replacing("recommendations"),
            highlights: Channel::records("highlights"),
            errors: Channel::appending("errors"),
        }
    }

    fn summary(&self) -> String {
        let mut out = format!("{} ({})", self.scenario.name, self.scenario.scenario_type);

        if let Some(feasibility) = self.feasibility.get() {
            out.push_str(&format!(
                ": feasibility {:.0}/100, {:?} risk band",
                feasibility.feasibility_score, feasibility.feasibility_risk_band
            ));
        }
        if let Some(effects) = self.effects.get() {
            out.push_str(&format!(", monthly impact {:+.2}", effects.monthly_impact));
        }
        if !self.errors.get().is_empty() {
            out.push_str(&format!(", {} phase(s) failed", self.errors.get().len()));
        }

        out
    }

    fn into_data(self) -> Result<Value> {
        Ok(json!({
            "scenario_id": self.scenario.id,
            "validation": serde_json::to_value(self.validation.into_inner())?,
            "effects": serde_json::to_value(self.effects.into_inner())?,
            "conflicts": serde_json::to_value(self.conflicts.into_inner())?,
            "simulation": serde_json::to_value(self.simulation.into_inner())?,
            "feasibility": serde_json::to_value(self.feasibility.into_inner())?,
            "recommendations": serde_json::to_value(self.recommendations.into_inner())?,
            "highlights": self.highlights.into_inner(),
            "errors": serde_json::to_value(self.errors.into_inner())?,
        }))
    }
}

#[derive(Default)]
pub struct AnalysisUpdate {
    validation: Option<ValidationResult>,
    effects: Option<FinancialEffects>,
    conflicts: Option<ConflictAnalysis>,
    simulation: Option<MonteCarloResult>,
    feasibility: Option<FeasibilityAssessment>,
    recommendations: Option<RecommendationSet>,
    highlights: Option<BTreeMap<String, Value>>,
}

fn highlight(key: &str, value: impl Into<Value>) -> Option<BTreeMap<String, Value>> {
    Some(BTreeMap::from([(key.to_string(), value.into())]))
}

impl WorkflowState for AnalysisState {
    type Update = AnalysisUpdate;

    fn apply(&mut self, update: AnalysisUpdate) {
        if let Some(validation) = update.validation {
            self.validation.merge(Some(validation));
        }
        if let Some(effects) = update.effects {
            self.effects.merge(Some(effects));
        }
        if let Some(conflicts) = update.conflicts {
            self.conflicts.merge(Some(conflicts));
        }
        if let Some(simulation) = update.simulation {
            self.simulation.merge(Some(simulation));
        }
        if let Some(feasibility) = update.feasibility {
            self.feasibility.merge(Some(feasibility));
        }
        if let Some(recommendations) = update.recommendations {
            self.recommendations.merge(Some(recommendations));
        }
        if let Some(highlights) = update.highlights {
            self.highlights.merge(highlights);
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
impl Node<AnalysisState> for SynthesizeNode {
    fn name(&self) -> &'static str {
        "synthesize"
    }

    async fn run(&self, state: &AnalysisState) -> Result<AnalysisUpdate> {
        let synthesizer = &self.components.synthesizer;
        let records = synthesizer.from_assessment(
            &state.scenario,
            state.effects.get().as_ref(),
            state.conflicts.get().as_ref(),
            state.feasibility.get().as_ref(),
        );
        let set = synthesizer.synthesize(&state.scenario, records, &state.context).await;

        Ok(AnalysisUpdate {
            recommendations: Some(set),
            ..AnalysisUpdate::default()
        })
    }
}

fn build_graph(components: Arc<AnalysisComponents>) -> Result<CompiledGraph<AnalysisState>> {
    let mut graph = StateGraph::new("scenario_analysis");

    let c = Arc::clone(&components);
    graph.add_node(node_fn("validate", move |state: &AnalysisState| -> Result<AnalysisUpdate> {
        let result = c.validator.validate(&state.scenario, Some(state.context.as_ref()));
        Ok(AnalysisUpdate {
            highlights: highlight("validation_score", result.validation_score),
            validation: Some(result),
            ..AnalysisUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("calculate_effects", move |state: &AnalysisState| -> Result<AnalysisUpdate> {
        let effects = c.calculator.calculate(&state.scenario, &state.context);
        Ok(AnalysisUpdate {
            highlights: highlight("monthly_impact", effects.monthly_impact),
            effects: Some(effects),
            ..AnalysisUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("analyze_conflicts", move |state: &AnalysisState| -> Result<AnalysisUpdate> {
        let analysis = c.analyzer.analyze(&state.scenario, &state.context);
        Ok(AnalysisUpdate {
            highlights: highlight("compatibility_score", analysis.compatibility_score),
            conflicts: Some(analysis),
            ..AnalysisUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("simulate", move |state: &AnalysisState| -> Result<AnalysisUpdate> {
        let impact = c.calculator.combined_monthly_impact(&state.scenario, &state.context);
        let result = c.simulator.simulate(impact, &state.context);
        Ok(AnalysisUpdate {
            highlights: highlight("median_final_balance", result.percentiles.p50),
            simulation: Some(result),
            ..AnalysisUpdate::default()
        })
    }));

    let c = Arc::clone(&components);
    graph.add_node(node_fn("assess_feasibility", move |state: &AnalysisState| -> Result<AnalysisUpdate> {
        let effects = state.effects.get().as_ref().ok_or_else(|| {
            ScenarioError::node("assess_feasibility", "financial effects are unavailable")
        })?;

        let assessment = c.scorer.assess(
            &state.scenario,
            &state.context,
            effects,
            state.conflicts.get().as_ref(),
            state.simulation.get().as_ref(),
        );
        Ok(AnalysisUpdate {
            highlights: highlight("feasibility_score", assessment.feasibility_score),
            feasibility: Some(assessment),
            ..AnalysisUpdate::default()
        })
    }));

    graph.add_node(SynthesizeNode { components });
    graph.chain(&PHASES);
    graph.compile()
}

/// Full assessment of one scenario against the caller's finances
pub struct ScenarioAnalysisPipeline {
    graph: CompiledGraph<AnalysisState>,
}

impl ScenarioAnalysisPipeline {
    pub fn new(components: Arc<AnalysisComponents>) -> Result<Self> {
        Ok(Self {
            graph: build_graph(components)?,
        })
    }
}

#[async_trait]
impl Pipeline for ScenarioAnalysisPipeline {
    fn name(&self) -> &'static str {
        "scenario_analysis"
    }

    fn phases(&self) -> Vec<&'static str> {
        self.graph.phase_names()
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Lru
    }

    fn check_input(&self, input: &PipelineInput) -> Result<()> {
        input.require_scenario()?;
        input.require_context()?;
        Ok(())
    }

    async fn run(&self, input: Arc<PipelineInput>, run_id: Uuid) -> Result<PipelineOutput> {
        let scenario = Arc::new(input.require_scenario()?.clone());
        let context = Arc::new(input.require_context()?.clone());

        info!(
            run_id = %run_id,
            scenario_id = %scenario.id,
            scenario_type = %scenario.scenario_type,
            "Scenario analysis starting"
        );

        let outcome = self
            .graph
            .invoke(AnalysisState::new(scenario, context), run_id)
            .await;

        Ok(PipelineOutput {
            summary: outcome.state.summary(),
            data: outcome.state.into_data()?,
            metadata: outcome.metadata,
        })
    }
}
