//! Scenario Intelligence Engine
//!
//! Evaluates proposed personal-finance changes against a user's current
//! finances:
//! - Validates scenarios and computes their monthly cash-flow effect
//! - Detects conflicts and synergies with scenarios already in flight
//! - Runs Monte Carlo projections and scores feasibility
//! - Generates and ranks parameter variants
//! - Synthesizes recommendations, optionally enriched by an LLM
//!
//! PIPELINE:
//! EXECUTE → LOOKUP → CACHE? → GRAPH(validate → … → synthesize) → RESULT

pub mod config;
pub mod conflicts;
pub mod effects;
pub mod error;
pub mod feasibility;
pub mod graph;
pub mod insights;
pub mod models;
pub mod orchestrator;
pub mod pipelines;
pub mod ranking;
pub mod recommendation;
pub mod simulation;
pub mod validation;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use orchestrator::{ExecuteOptions, ExecutionResult, Orchestrator};
