//! State-graph engine for sequential analysis pipelines
//!
//! Nodes read the accumulated state and return a partial update. The engine
//! walks a static edge list from `START` to `END`, folding each update into
//! the state through the per-channel merge functions.
//!
//! A failing node never aborts the run: its error is appended to the errors
//! channel and the walk continues with every other channel untouched.

pub mod channel;

pub use channel::{Channel, MergeFn};

use crate::error::ScenarioError;
use crate::models::{ExecutionMetadata, NodeError, PhaseRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const START: &str = "__start__";
pub const END: &str = "__end__";

/// Explicit state of one pipeline
pub trait WorkflowState: Send + Sync + 'static {
    /// Partial update returned by nodes; absent fields leave channels as-is
    type Update: Send + Default + 'static;

    fn apply(&mut self, update: Self::Update);

    /// Append to the errors channel
    fn record_error(&mut self, error: NodeError);
}

/// A single step of a pipeline
#[async_trait]
pub trait Node<S: WorkflowState>: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, state: &S) -> Result<S::Update>;
}

/// Adapts a synchronous closure into a node
pub struct FnNode<F> {
    name: &'static str,
    f: F,
}

pub fn node_fn<F>(name: &'static str, f: F) -> FnNode<F> {
    FnNode { name, f }
}

#[async_trait]
impl<S, F> Node<S> for FnNode<F>
where
    S: WorkflowState,
    F: Fn(&S) -> Result<S::Update> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, state: &S) -> Result<S::Update> {
        (self.f)(state)
    }
}

/// Graph under construction
pub struct StateGraph<S: WorkflowState> {
    name: String,
    nodes: HashMap<&'static str, Arc<dyn Node<S>>>,
    edges: Vec<(String, String)>,
}

impl<S: WorkflowState> StateGraph<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: impl Node<S> + 'static) -> &mut Self {
        self.nodes.insert(node.name(), Arc::new(node));
        self
    }

    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.edges.push((from.to_string(), to.to_string()));
        self
    }

    /// Wire `START -> names[0] -> ... -> names[n-1] -> END`
    pub fn chain(&mut self, names: &[&str]) -> &mut Self {
        let mut previous = START;
        for name in names {
            self.add_edge(previous, name);
            previous = name;
        }
        self.add_edge(previous, END)
    }

    /// Resolve the edge list into an execution order
    pub fn compile(self) -> Result<CompiledGraph<S>> {
        let mut next: HashMap<&str, &str> = HashMap::with_capacity(self.edges.len());

        for (from, to) in &self.edges {
            for endpoint in [from.as_str(), to.as_str()] {
                if endpoint != START && endpoint != END && !self.nodes.contains_key(endpoint) {
                    return Err(ScenarioError::InvalidGraph(format!(
                        "{}: edge references unknown node '{}'",
                        self.name, endpoint
                    )));
                }
            }
            if from == END {
                return Err(ScenarioError::InvalidGraph(format!(
                    "{}: END cannot have outgoing edges",
                    self.name
                )));
            }
            if next.insert(from.as_str(), to.as_str()).is_some() {
                return Err(ScenarioError::InvalidGraph(format!(
                    "{}: node '{}' has more than one outgoing edge",
                    self.name, from
                )));
            }
        }

        let mut order: Vec<Arc<dyn Node<S>>> = Vec::with_capacity(self.nodes.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut cursor = START;

        loop {
            let target = *next.get(cursor).ok_or_else(|| {
                ScenarioError::InvalidGraph(format!(
                    "{}: no edge leaving '{}' before END",
                    self.name, cursor
                ))
            })?;

            if target == END {
                break;
            }
            if !visited.insert(target) {
                return Err(ScenarioError::InvalidGraph(format!(
                    "{}: cycle detected at '{}'",
                    self.name, target
                )));
            }

            // Presence was checked while indexing edges
            if let Some(node) = self.nodes.get(target) {
                order.push(Arc::clone(node));
            }
            cursor = target;
        }

        if let Some(orphan) = self.nodes.keys().find(|name| !visited.contains(*name)) {
            return Err(ScenarioError::InvalidGraph(format!(
                "{}: node '{}' is not reachable from START",
                self.name, orphan
            )));
        }

        Ok(CompiledGraph {
            name: self.name,
            order,
        })
    }
}

/// Final state and bookkeeping of a graph run
pub struct GraphOutcome<S> {
    pub state: S,
    pub metadata: ExecutionMetadata,
}

/// Graph with a resolved, fixed execution order
pub struct CompiledGraph<S: WorkflowState> {
    name: String,
    order: Vec<Arc<dyn Node<S>>>,
}

impl<S: WorkflowState> CompiledGraph<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.order.iter().map(|node| node.name()).collect()
    }

    /// Run every node in order against `state`
    pub async fn invoke(&self, mut state: S, run_id: Uuid) -> GraphOutcome<S> {
        let mut metadata = ExecutionMetadata::new(run_id);

        info!(
            graph = %self.name,
            run_id = %run_id,
            node_count = self.order.len(),
            "Graph run starting"
        );

        for node in &self.order {
            let phase = node.name();
            let start = Instant::now();

            debug!(graph = %self.name, phase, "Running node");

            let outcome = node.run(&state).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let success = match outcome {
                Ok(update) => {
                    state.apply(update);
                    true
                }
                Err(e) => {
                    warn!(
                        graph = %self.name,
                        phase,
                        error = %e,
                        "Node failed, continuing with partial state"
                    );

                    let error = NodeError {
                        phase: phase.to_string(),
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    };
                    state.record_error(error.clone());
                    metadata.errors.push(error);
                    false
                }
            };

            metadata.phases.push(PhaseRecord {
                name: phase.to_string(),
                duration_ms,
                success,
            });
        }

        debug!(
            graph = %self.name,
            run_id = %run_id,
            failed_phases = metadata.errors.len(),
            "Graph run completed"
        );

        GraphOutcome { state, metadata }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct CounterState {
        total: Channel<i64>,
        visited: Channel<Vec<String>>,
        notes: Channel<BTreeMap<String, String>>,
        errors: Channel<Vec<NodeError>>,
    }

    impl CounterState {
        fn new() -> Self {
            Self {
                total: Channel::new("total", || 0, |slot, v| *slot += v),
                visited: Channel::appending("visited"),
                notes: Channel::records("notes"),
                errors: Channel::appending("errors"),
            }
        }
    }

    #[derive(Default)]
    struct CounterUpdate {
        total: Option<i64>,
        visited: Option<Vec<String>>,
        notes: Option<BTreeMap<String, String>>,
    }

    impl WorkflowState for CounterState {
        type Update = CounterUpdate;

        fn apply(&mut self, update: CounterUpdate) {
            if let Some(total) = update.total {
                self.total.merge(total);
            }
            if let Some(visited) = update.visited {
                self.visited.merge(visited);
            }
            if let Some(notes) = update.notes {
                self.notes.merge(notes);
            }
        }

        fn record_error(&mut self, error: NodeError) {
            self.errors.merge(vec![error]);
        }
    }

    fn step(name: &'static str, amount: i64) -> FnNode<impl Fn(&CounterState) -> Result<CounterUpdate>> {
        node_fn(name, move |_state: &CounterState| {
            Ok(CounterUpdate {
                total: Some(amount),
                visited: Some(vec![name.to_string()]),
                notes: Some(BTreeMap::from([("last".to_string(), name.to_string())])),
            })
        })
    }

    #[tokio::test]
    async fn test_runs_nodes_in_edge_order() {
        let mut graph = StateGraph::new("ordered");
        graph
            .add_node(step("b", 2))
            .add_node(step("a", 1))
            .add_node(step("c", 3))
            .chain(&["a", "b", "c"]);

        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.phase_names(), vec!["a", "b", "c"]);

        let outcome = compiled.invoke(CounterState::new(), Uuid::new_v4()).await;
        assert_eq!(*outcome.state.total.get(), 6);
        assert_eq!(outcome.state.visited.get(), &vec!["a", "b", "c"]);
        assert_eq!(outcome.state.notes.get().get("last").map(String::as_str), Some("c"));
        assert_eq!(outcome.metadata.phases.len(), 3);
        assert!(outcome.metadata.phases.iter().all(|p| p.success));
    }

    #[tokio::test]
    async fn test_failing_node_does_not_abort_run() {
        let mut graph = StateGraph::new("partial");
        graph
            .add_node(step("first", 5))
            .add_node(node_fn("broken", |_state: &CounterState| -> Result<CounterUpdate> {
                Err(ScenarioError::node("broken", "boom"))
            }))
            .add_node(step("last", 7))
            .chain(&["first", "broken", "last"]);

        let outcome = graph
            .compile()
            .unwrap()
            .invoke(CounterState::new(), Uuid::new_v4())
            .await;

        assert_eq!(*outcome.state.total.get(), 12);
        assert_eq!(outcome.state.visited.get(), &vec!["first", "last"]);

        let errors = outcome.state.errors.get();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].phase, "broken");
        assert!(errors[0].message.contains("boom"));

        let flags: Vec<bool> = outcome.metadata.phases.iter().map(|p| p.success).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(outcome.metadata.errors.len(), 1);
    }

    #[test]
    fn test_compile_rejects_unknown_node() {
        let mut graph: StateGraph<CounterState> = StateGraph::new("bad");
        graph.add_node(step("a", 1)).chain(&["a", "ghost"]);
        assert!(matches!(graph.compile(), Err(ScenarioError::InvalidGraph(_))));
    }

    #[test]
    fn test_compile_rejects_cycle() {
        let mut graph: StateGraph<CounterState> = StateGraph::new("cyclic");
        graph
            .add_node(step("a", 1))
            .add_node(step("b", 1))
            .add_edge(START, "a")
            .add_edge("a", "b")
            .add_edge("b", "a");
        assert!(matches!(graph.compile(), Err(ScenarioError::InvalidGraph(_))));
    }

    #[test]
    fn test_compile_rejects_unreachable_node() {
        let mut graph: StateGraph<CounterState> = StateGraph::new("orphan");
        graph
            .add_node(step("a", 1))
            .add_node(step("lonely", 1))
            .chain(&["a"]);
        assert!(matches!(graph.compile(), Err(ScenarioError::InvalidGraph(_))));
    }
}
