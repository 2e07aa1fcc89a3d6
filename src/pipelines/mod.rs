//! Named pipelines and their registry
//!
//! Each pipeline owns a compiled state graph over its own explicit state
//! struct. Pipelines are looked up by name and run by the orchestrator.

pub mod analysis;
pub mod comparison;
pub mod optimization;

pub use analysis::ScenarioAnalysisPipeline;
pub use comparison::ScenarioComparisonPipeline;
pub use optimization::ScenarioOptimizationPipeline;

use crate::config::OrchestratorConfig;
use crate::conflicts::ConflictSynergyAnalyzer;
use crate::effects::FinancialEffectCalculator;
use crate::error::ScenarioError;
use crate::feasibility::FeasibilityScorer;
use crate::insights::InsightProvider;
use crate::models::{ExecutionMetadata, FinancialContext, Scenario, TransactionRecord};
use crate::ranking::variations::VariationGenerator;
use crate::ranking::MultiCriteriaRanker;
use crate::recommendation::RecommendationSynthesizer;
use crate::simulation::MonteCarloSimulator;
use crate::validation::{create_default_validator, ScenarioValidator};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Caller-supplied input shared by every pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineInput {
    #[serde(default)]
    pub scenario: Option<Scenario>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub context: Option<FinancialContext>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
    /// Preference flags such as `risk-averse` or `needs liquidity`
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl PipelineInput {
    pub fn for_scenario(scenario: Scenario, context: FinancialContext) -> Self {
        Self {
            scenario: Some(scenario),
            context: Some(context),
            ..Self::default()
        }
    }

    pub fn for_scenarios(scenarios: Vec<Scenario>, context: FinancialContext) -> Self {
        Self {
            scenarios,
            context: Some(context),
            ..Self::default()
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_transactions(mut self, transactions: Vec<TransactionRecord>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn require_scenario(&self) -> Result<&Scenario> {
        self.scenario
            .as_ref()
            .ok_or_else(|| ScenarioError::MissingInput("scenario".to_string()))
    }

    pub fn require_context(&self) -> Result<&FinancialContext> {
        self.context
            .as_ref()
            .ok_or_else(|| ScenarioError::MissingInput("financial context".to_string()))
    }
}

/// Which result cache a pipeline's output goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Capacity-bounded, evicts the oldest insertion
    Lru,
    /// Time-bounded, for longer-running pipelines
    Ttl,
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub data: Value,
    pub summary: String,
    pub metadata: ExecutionMetadata,
}

/// Trait for a named pipeline
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ordered phase names, used for synthetic progress
    fn phases(&self) -> Vec<&'static str>;

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Lru
    }

    /// Reject input missing its required top-level fields
    fn check_input(&self, input: &PipelineInput) -> Result<()>;

    async fn run(&self, input: Arc<PipelineInput>, run_id: Uuid) -> Result<PipelineOutput>;
}

/// Analysis components shared by every pipeline node
pub struct AnalysisComponents {
    pub validator: ScenarioValidator,
    pub calculator: FinancialEffectCalculator,
    pub analyzer: ConflictSynergyAnalyzer,
    pub simulator: MonteCarloSimulator,
    pub scorer: FeasibilityScorer,
    pub generator: VariationGenerator,
    pub ranker: MultiCriteriaRanker,
    pub synthesizer: RecommendationSynthesizer,
}

impl AnalysisComponents {
    pub fn new(config: &OrchestratorConfig, provider: Option<Arc<dyn InsightProvider>>) -> Self {
        let simulator = MonteCarloSimulator::new()
            .with_trials(config.monte_carlo_trials)
            .with_optional_seed(config.monte_carlo_seed);

        let synthesizer = match provider {
            Some(provider) => RecommendationSynthesizer::new().with_provider(provider, config.llm_timeout),
            None => RecommendationSynthesizer::new(),
        };

        Self {
            validator: create_default_validator(),
            calculator: FinancialEffectCalculator::new(),
            analyzer: ConflictSynergyAnalyzer::new(),
            ranker: MultiCriteriaRanker::new(simulator.clone()),
            simulator,
            scorer: FeasibilityScorer::new(),
            generator: VariationGenerator::new(),
            synthesizer,
        }
    }
}

/// Pipeline registry for looking up pipelines by name
pub struct PipelineRegistry {
    pipelines: HashMap<String, Arc<dyn Pipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    pub fn register(&mut self, pipeline: Arc<dyn Pipeline>) {
        self.pipelines.insert(pipeline.name().to_string(), pipeline);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Pipeline>> {
        self.pipelines.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pipelines.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with the three built-in pipelines
pub fn create_default_registry(
    config: &OrchestratorConfig,
    provider: Option<Arc<dyn InsightProvider>>,
) -> Result<PipelineRegistry> {
    let components = Arc::new(AnalysisComponents::new(config, provider));

    let mut registry = PipelineRegistry::new();
    registry.register(Arc::new(ScenarioAnalysisPipeline::new(Arc::clone(&components))?));
    registry.register(Arc::new(ScenarioOptimizationPipeline::new(Arc::clone(&components))?));
    registry.register(Arc::new(ScenarioComparisonPipeline::new(components)?));

    Ok(registry)
}
