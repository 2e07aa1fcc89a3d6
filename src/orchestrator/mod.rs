//! Orchestrator - runs named pipelines
//!
//! LOOKUP → CHECK INPUT → CACHE? → SPAWN → RACE(timer, progress) → CACHE → RESULT
//!
//! The orchestrator never returns an error or panics past `execute`; every
//! failure becomes an `ExecutionResult` with `success = false`.
//!
//! Progress events are synthetic. The graph engine gives no per-node signal
//! while a run is in flight, so the orchestrator steps through the
//! pipeline's declared phases on a fixed interval and caps the reported
//! completion at 95% until the real result arrives.

pub mod cache;

use crate::config::OrchestratorConfig;
use crate::error::ScenarioError;
use crate::insights::provider_from_config;
use crate::models::{NodeError, PhaseRecord};
use crate::pipelines::{create_default_registry, CachePolicy, PipelineInput, PipelineOutput, PipelineRegistry};
use crate::Result;
use cache::{fingerprint, LruStore, TtlStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Highest completion reported before the real result resolves
const MAX_SYNTHETIC_PERCENT: u8 = 95;

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// One progress notification; `complete` is only set on the final event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    pub phase: String,
    pub percent: u8,
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Clone)]
pub struct ExecuteOptions {
    pub use_cache: bool,
    /// Falls back to the configured default
    pub timeout: Option<Duration>,
    pub on_progress: Option<ProgressCallback>,
    /// Lets the caller know the id up front, e.g. to cancel
    pub run_id: Option<Uuid>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            timeout: None,
            on_progress: None,
            run_id: None,
        }
    }
}

impl ExecuteOptions {
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultMetadata {
    pub run_id: Uuid,
    pub pipeline: String,
    pub execution_time_ms: u64,
    pub cached: bool,
    pub phases: Vec<PhaseRecord>,
    pub errors: Vec<NodeError>,
    pub summary: String,
}

/// Outcome of `Orchestrator::execute`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExecutionResult {
    fn failure(error: &ScenarioError, details: Option<Value>) -> Self {
        Self {
            success: false,
            data: None,
            metadata: None,
            error: Some(error.to_string()),
            details,
        }
    }
}

/// Bookkeeping entry for an in-flight run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActiveRun {
    pub run_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub lru_entries: usize,
    pub lru_capacity: usize,
    pub ttl_entries: usize,
}

#[derive(Debug, Clone)]
struct CachedRun {
    data: Value,
    summary: String,
    phases: Vec<PhaseRecord>,
    errors: Vec<NodeError>,
}

/// Step through `phases` for the `tick`-th synthetic event
pub(crate) fn synthetic_progress(phases: &[&'static str], tick: usize) -> (&'static str, u8) {
    let Some(last) = phases.len().checked_sub(1) else {
        return ("running", 0);
    };

    let phase = phases[tick.min(last)];
    let percent = ((tick + 1) * 100 / phases.len()).min(MAX_SYNTHETIC_PERCENT as usize) as u8;
    (phase, percent)
}

/// Main orchestrator; construct once and share by handle
pub struct Orchestrator {
    registry: PipelineRegistry,
    config: OrchestratorConfig,
    lru: RwLock<LruStore<CachedRun>>,
    ttl: RwLock<TtlStore<CachedRun>>,
    active: RwLock<HashMap<Uuid, ActiveRun>>,
}

impl Orchestrator {
    pub fn new(registry: PipelineRegistry, config: OrchestratorConfig) -> Self {
        Self {
            lru: RwLock::new(LruStore::new(config.cache_capacity)),
            ttl: RwLock::new(TtlStore::new(config.result_ttl)),
            active: RwLock::new(HashMap::new()),
            registry,
            config,
        }
    }

    /// Default pipelines, with the Gemini collaborator when a key is set
    pub fn from_config(config: OrchestratorConfig) -> Result<Self> {
        let registry = create_default_registry(&config, provider_from_config(&config))?;
        Ok(Self::new(registry, config))
    }

    pub fn pipelines(&self) -> Vec<&str> {
        self.registry.list()
    }

    pub async fn execute(
        &self,
        pipeline_name: &str,
        input: PipelineInput,
        options: ExecuteOptions,
    ) -> ExecutionResult {
        let start_time = Instant::now();
        let run_id = options.run_id.unwrap_or_else(Uuid::new_v4);

        let Some(pipeline) = self.registry.get(pipeline_name) else {
            let error = ScenarioError::PipelineNotFound(pipeline_name.to_string());
            warn!(pipeline = pipeline_name, "Unknown pipeline requested");
            return ExecutionResult::failure(&error, Some(json!({ "available": self.pipelines() })));
        };

        if let Err(e) = pipeline.check_input(&input) {
            warn!(pipeline = pipeline_name, error = %e, "Pipeline input rejected");
            return ExecutionResult::failure(&e, None);
        }

        let policy = pipeline.cache_policy();
        let cache_key = if options.use_cache {
            match fingerprint(pipeline_name, &input) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "Could not fingerprint input, caching disabled for this run");
                    None
                }
            }
        } else {
            None
        };

        if let Some(key) = &cache_key {
            if let Some(hit) = self.lookup(policy, key).await {
                info!(pipeline = pipeline_name, run_id = %run_id, "Serving cached result");
                emit_complete(options.on_progress.as_ref(), run_id, &hit.summary);
                return success(pipeline_name, run_id, start_time, hit, true);
            }
        }

        info!(
            pipeline = pipeline_name,
            run_id = %run_id,
            use_cache = options.use_cache,
            "Orchestrator: starting execution"
        );

        self.active.write().await.insert(
            run_id,
            ActiveRun {
                run_id,
                pipeline: pipeline_name.to_string(),
                started_at: Utc::now(),
            },
        );

        let phases = pipeline.phases();
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);
        let input = Arc::new(input);
        let task = {
            let pipeline = Arc::clone(&pipeline);
            let input = Arc::clone(&input);
            tokio::spawn(async move { pipeline.run(input, run_id).await })
        };

        let outcome = self
            .race(task, &phases, timeout, options.on_progress.as_ref(), run_id)
            .await;

        // A missing entry means the run was cancelled while in flight
        let still_active = self.active.write().await.remove(&run_id).is_some();

        if !still_active {
            info!(run_id = %run_id, "Discarding result of cancelled run");
            return ExecutionResult::failure(&ScenarioError::Cancelled(run_id), None);
        }

        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                warn!(pipeline = pipeline_name, run_id = %run_id, error = %e, "Pipeline run failed");
                let details = match &e {
                    ScenarioError::Timeout(ms) => Some(json!({ "timeout_ms": ms, "run_id": run_id })),
                    _ => Some(json!({ "run_id": run_id })),
                };
                return ExecutionResult::failure(&e, details);
            }
        };

        let PipelineOutput {
            data,
            summary,
            metadata,
        } = output;
        let run = CachedRun {
            data,
            summary,
            phases: metadata.phases,
            errors: metadata.errors,
        };

        if let Some(key) = cache_key {
            self.store(policy, key, run.clone()).await;
        }

        emit_complete(options.on_progress.as_ref(), run_id, &run.summary);

        info!(
            pipeline = pipeline_name,
            run_id = %run_id,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            failed_phases = run.errors.len(),
            "Orchestrator: execution complete"
        );

        success(pipeline_name, run_id, start_time, run, false)
    }

    /// Wait for the task while ticking progress, until it resolves or the
    /// timer fires. On timeout the task is detached, not aborted.
    async fn race(
        &self,
        mut task: JoinHandle<Result<PipelineOutput>>,
        phases: &[&'static str],
        timeout: Duration,
        progress: Option<&ProgressCallback>,
        run_id: Uuid,
    ) -> Result<PipelineOutput> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.config.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick = 0usize;

        loop {
            tokio::select! {
                joined = &mut task => {
                    return joined.map_err(|e| ScenarioError::TaskJoin(e.to_string()))?;
                }
                _ = &mut deadline => {
                    warn!(
                        run_id = %run_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "Run timed out; abandoning in-flight computation"
                    );
                    return Err(ScenarioError::Timeout(timeout.as_millis() as u64));
                }
                _ = ticker.tick() => {
                    if let Some(callback) = progress {
                        let (phase, percent) = synthetic_progress(phases, tick);
                        callback(ProgressEvent {
                            run_id,
                            phase: phase.to_string(),
                            percent,
                            complete: false,
                            summary: None,
                        });
                    }
                    tick += 1;
                }
            }
        }
    }

    async fn lookup(&self, policy: CachePolicy, key: &str) -> Option<CachedRun> {
        match policy {
            CachePolicy::Lru => self.lru.read().await.get(key).cloned(),
            CachePolicy::Ttl => self.ttl.read().await.get(key).cloned(),
        }
    }

    async fn store(&self, policy: CachePolicy, key: String, run: CachedRun) {
        match policy {
            CachePolicy::Lru => {
                if let Some(evicted) = self.lru.write().await.insert(key, run) {
                    debug!(evicted = %evicted, "LRU cache full, evicted oldest entry");
                }
            }
            CachePolicy::Ttl => self.ttl.write().await.insert(key, run),
        }
    }

    /// Drop the bookkeeping entry for a run. In-flight nodes keep running;
    /// their result is discarded.
    pub async fn cancel(&self, run_id: Uuid) -> bool {
        let removed = self.active.write().await.remove(&run_id).is_some();
        if removed {
            info!(run_id = %run_id, "Run cancelled");
        }
        removed
    }

    pub async fn active_runs(&self) -> Vec<ActiveRun> {
        let mut runs: Vec<ActiveRun> = self.active.read().await.values().cloned().collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    pub async fn clear_cache(&self) {
        self.lru.write().await.clear();
        self.ttl.write().await.clear();
        debug!("Result caches cleared");
    }

    pub async fn cache_stats(&self) -> CacheStats {
        let lru = self.lru.read().await;
        CacheStats {
            lru_entries: lru.len(),
            lru_capacity: lru.capacity(),
            ttl_entries: self.ttl.read().await.len(),
        }
    }
}

fn emit_complete(progress: Option<&ProgressCallback>, run_id: Uuid, summary: &str) {
    if let Some(callback) = progress {
        callback(ProgressEvent {
            run_id,
            phase: "complete".to_string(),
            percent: 100,
            complete: true,
            summary: Some(summary.to_string()),
        });
    }
}

fn success(pipeline: &str, run_id: Uuid, start_time: Instant, run: CachedRun, cached: bool) -> ExecutionResult {
    ExecutionResult {
        success: true,
        data: Some(run.data),
        metadata: Some(ResultMetadata {
            run_id,
            pipeline: pipeline.to_string(),
            execution_time_ms: start_time.elapsed().as_millis() as u64,
            cached,
            phases: run.phases,
            errors: run.errors,
            summary: run.summary,
        }),
        error: None,
        details: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{node_fn, Channel, CompiledGraph, Node, StateGraph, WorkflowState};
    use crate::models::{FinancialContext, Scenario, ScenarioType};
    use crate::pipelines::Pipeline;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountState {
        hits: Channel<Vec<usize>>,
        errors: Channel<Vec<NodeError>>,
    }

    #[derive(Default)]
    struct CountUpdate {
        hits: Option<Vec<usize>>,
    }

    impl WorkflowState for CountState {
        type Update = CountUpdate;

        fn apply(&mut self, update: CountUpdate) {
            if let Some(hits) = update.hits {
                self.hits.merge(hits);
            }
        }

        fn record_error(&mut self, error: NodeError) {
            self.errors.merge(vec![error]);
        }
    }

    /// Sleeps inside the graph before the counting node runs
    struct WaitNode {
        delay: Duration,
    }

    #[async_trait]
    impl Node<CountState> for WaitNode {
        fn name(&self) -> &'static str {
            "wait"
        }

        async fn run(&self, _state: &CountState) -> Result<CountUpdate> {
            tokio::time::sleep(self.delay).await;
            Ok(CountUpdate::default())
        }
    }

    /// Counts node invocations
    struct CountingPipeline {
        name: &'static str,
        policy: CachePolicy,
        graph: CompiledGraph<CountState>,
    }

    impl CountingPipeline {
        fn new(name: &'static str, policy: CachePolicy, delay: Duration, counter: Arc<AtomicUsize>) -> Self {
            let mut graph = StateGraph::new(name);
            graph
                .add_node(WaitNode { delay })
                .add_node(node_fn("count", move |_state: &CountState| -> Result<CountUpdate> {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(CountUpdate { hits: Some(vec![n]) })
                }))
                .chain(&["wait", "count"]);

            Self {
                name,
                policy,
                graph: graph.compile().unwrap(),
            }
        }
    }

    #[async_trait]
    impl Pipeline for CountingPipeline {
        fn name(&self) -> &'static str {
            self.name
        }

        fn phases(&self) -> Vec<&'static str> {
            self.graph.phase_names()
        }

        fn cache_policy(&self) -> CachePolicy {
            self.policy
        }

        fn check_input(&self, input: &PipelineInput) -> Result<()> {
            input.require_scenario().map(|_| ())
        }

        async fn run(&self, _input: Arc<PipelineInput>, run_id: Uuid) -> Result<PipelineOutput> {
            let state = CountState {
                hits: Channel::appending("hits"),
                errors: Channel::appending("errors"),
            };
            let outcome = self.graph.invoke(state, run_id).await;

            Ok(PipelineOutput {
                data: json!({ "hits": outcome.state.hits.get() }),
                summary: "counted".to_string(),
                metadata: outcome.metadata,
            })
        }
    }

    fn config(capacity: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            cache_capacity: capacity,
            progress_interval: Duration::from_millis(10),
            ..OrchestratorConfig::default()
        }
    }

    fn orchestrator(delay: Duration, counter: Arc<AtomicUsize>) -> Orchestrator {
        let mut registry = PipelineRegistry::new();
        registry.register(Arc::new(CountingPipeline::new(
            "counting",
            CachePolicy::Lru,
            delay,
            Arc::clone(&counter),
        )));
        registry.register(Arc::new(CountingPipeline::new(
            "counting_ttl",
            CachePolicy::Ttl,
            delay,
            counter,
        )));
        Orchestrator::new(registry, config(2))
    }

    fn input(amount: f64) -> PipelineInput {
        PipelineInput::for_scenario(
            Scenario::new("s", "Save", ScenarioType::EmergencyFund).with_param("monthlyContribution", amount),
            FinancialContext::new(2_000.0, 5_000.0, 3_500.0),
        )
    }

    #[tokio::test]
    async fn test_cache_idempotence() {
        let counter = Arc::new(AtomicUsize::new(0));
        let orchestrator = orchestrator(Duration::ZERO, Arc::clone(&counter));

        let first = orchestrator.execute("counting", input(100.0), ExecuteOptions::default()).await;
        let second = orchestrator.execute("counting", input(100.0), ExecuteOptions::default()).await;

        assert!(first.success && second.success);
        assert!(!first.metadata.as_ref().unwrap().cached);
        assert!(second.metadata.as_ref().unwrap().cached);
        assert_eq!(first.data, second.data);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let fresh = orchestrator
            .execute("counting", input(100.0), ExecuteOptions::default().without_cache())
            .await;
        assert!(!fresh.metadata.unwrap().cached);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_changed_secondary_parameter_misses_cache() {
        let orchestrator = Orchestrator::from_config(OrchestratorConfig {
            monte_carlo_seed: Some(9),
            ..OrchestratorConfig::default()
        })
        .unwrap();
        let job = |current: i64| {
            PipelineInput::for_scenario(
                Scenario::new("job", "New role", ScenarioType::JobChange)
                    .with_param("newSalary", 7_000)
                    .with_param("currentSalary", current),
                FinancialContext::new(10_000.0, 6_000.0, 3_500.0),
            )
        };

        let first = orchestrator
            .execute("scenario_analysis", job(6_000), ExecuteOptions::default())
            .await;
        let second = orchestrator
            .execute("scenario_analysis", job(3_000), ExecuteOptions::default())
            .await;

        assert!(!second.metadata.unwrap().cached);
        assert_eq!(first.data.unwrap()["effects"]["monthly_impact"], 1_000.0);
        assert_eq!(second.data.unwrap()["effects"]["monthly_impact"], 4_000.0);
    }

    #[tokio::test]
    async fn test_lru_bound_through_orchestrator() {
        let counter = Arc::new(AtomicUsize::new(0));
        let orchestrator = orchestrator(Duration::ZERO, Arc::clone(&counter));

        for amount in [100.0, 200.0, 300.0] {
            orchestrator.execute("counting", input(amount), ExecuteOptions::default()).await;
        }
        let stats = orchestrator.cache_stats().await;
        assert_eq!(stats.lru_entries, 2);
        assert_eq!(stats.lru_capacity, 2);

        // 100 was the oldest insertion and must run again
        orchestrator.execute("counting", input(100.0), ExecuteOptions::default()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        let hit = orchestrator.execute("counting", input(300.0), ExecuteOptions::default()).await;
        assert!(hit.metadata.unwrap().cached);
    }

    #[tokio::test]
    async fn test_ttl_policy_uses_ttl_cache() {
        let counter = Arc::new(AtomicUsize::new(0));
        let orchestrator = orchestrator(Duration::ZERO, Arc::clone(&counter));

        orchestrator.execute("counting_ttl", input(100.0), ExecuteOptions::default()).await;
        let again = orchestrator.execute("counting_ttl", input(100.0), ExecuteOptions::default()).await;

        assert!(again.metadata.unwrap().cached);
        let stats = orchestrator.cache_stats().await;
        assert_eq!((stats.lru_entries, stats.ttl_entries), (0, 1));

        orchestrator.clear_cache().await;
        assert_eq!(orchestrator.cache_stats().await.ttl_entries, 0);
    }

    #[tokio::test]
    async fn test_timeout_returns_promptly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let orchestrator = orchestrator(Duration::from_secs(5), Arc::clone(&counter));

        let started = Instant::now();
        let result = orchestrator
            .execute(
                "counting",
                input(100.0),
                ExecuteOptions::default().with_timeout(Duration::from_millis(50)),
            )
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
        assert_eq!(result.details.unwrap()["timeout_ms"], 50);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(orchestrator.active_runs().await.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_cancelled_even_after_timeout() {
        let orchestrator = Arc::new(orchestrator(Duration::from_secs(5), Arc::new(AtomicUsize::new(0))));
        let run_id = Uuid::new_v4();

        let handle = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .execute(
                        "counting",
                        input(100.0),
                        ExecuteOptions::default()
                            .with_run_id(run_id)
                            .with_timeout(Duration::from_millis(120)),
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(orchestrator.cancel(run_id).await);

        let result = tokio_test::assert_ok!(handle.await);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled"));
        assert!(result.details.is_none());
    }

    #[tokio::test]
    async fn test_missing_input_and_unknown_pipeline() {
        let orchestrator = orchestrator(Duration::ZERO, Arc::new(AtomicUsize::new(0)));

        let missing = orchestrator
            .execute("counting", PipelineInput::default(), ExecuteOptions::default())
            .await;
        assert!(!missing.success);
        assert!(missing.error.unwrap().contains("Missing required input"));

        let unknown = orchestrator
            .execute("nope", input(100.0), ExecuteOptions::default())
            .await;
        assert!(!unknown.success);
        assert_eq!(unknown.details.unwrap()["available"], json!(["counting", "counting_ttl"]));
    }

    #[tokio::test]
    async fn test_cancellation_discards_result() {
        let orchestrator = Arc::new(orchestrator(
            Duration::from_millis(100),
            Arc::new(AtomicUsize::new(0)),
        ));
        let run_id = Uuid::new_v4();

        let handle = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .execute("counting", input(100.0), ExecuteOptions::default().with_run_id(run_id))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(orchestrator.active_runs().await.len(), 1);
        assert!(orchestrator.cancel(run_id).await);
        assert!(!orchestrator.cancel(run_id).await);

        let result = tokio_test::assert_ok!(handle.await);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled"));
        assert_eq!(orchestrator.cache_stats().await.lru_entries, 0);
    }

    #[tokio::test]
    async fn test_progress_ends_with_complete_event() {
        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Arc::new(move |event: ProgressEvent| sink.lock().unwrap().push(event));

        let orchestrator = orchestrator(Duration::from_millis(60), Arc::new(AtomicUsize::new(0)));
        let result = orchestrator
            .execute("counting", input(100.0), ExecuteOptions::default().with_progress(callback))
            .await;
        assert!(result.success);

        let events = events.lock().unwrap();
        assert!(events.len() >= 2);
        let (last, ticks) = events.split_last().unwrap();
        assert!(last.complete);
        assert_eq!(last.percent, 100);
        assert_eq!(last.summary.as_deref(), Some("counted"));
        assert!(ticks.iter().all(|e| !e.complete && e.percent <= 95));
    }

    #[test]
    fn test_synthetic_progress_caps_at_95() {
        let phases = ["validate", "calculate_effects", "simulate"];
        assert_eq!(synthetic_progress(&phases, 0), ("validate", 33));
        assert_eq!(synthetic_progress(&phases, 1), ("calculate_effects", 66));
        assert_eq!(synthetic_progress(&phases, 2), ("simulate", 95));
        assert_eq!(synthetic_progress(&phases, 40), ("simulate", 95));
        assert_eq!(synthetic_progress(&[], 3), ("running", 0));
    }

    #[tokio::test]
    async fn test_default_pipelines_end_to_end() {
        let config = OrchestratorConfig {
            monte_carlo_seed: Some(5),
            ..OrchestratorConfig::default()
        };
        let orchestrator = Orchestrator::from_config(config).unwrap();

        let result = orchestrator
            .execute(
                "scenario_analysis",
                PipelineInput::for_scenario(
                    Scenario::new("home", "Buy a flat", ScenarioType::HomePurchase)
                        .with_param("homePrice", 300_000)
                        .with_param("downPayment", 60_000)
                        .with_param("monthlyPayment", 1_800)
                        .with_param("currentRent", 1_400)
                        .with_existing(vec![Scenario::new("job", "New role", ScenarioType::JobChange)
                            .with_param("newSalary", 7_500)
                            .with_param("currentSalary", 6_500)]),
                    FinancialContext::new(70_000.0, 6_500.0, 4_200.0),
                ),
                ExecuteOptions::default(),
            )
            .await;

        assert!(result.success);
        let data = result.data.unwrap();
        let conflicts = data["conflicts"]["conflicts"].as_array().unwrap();
        assert!(conflicts
            .iter()
            .any(|c| c["conflict_type"] == "timing_conflict" && c["severity"] == "medium"));
        assert_eq!(result.metadata.unwrap().phases.len(), 6);
    }
}
