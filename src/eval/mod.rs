//! Evaluation Pipeline
//!
//! Fans a batch of test prompts out across the provider gateway, turns each
//! raw answer into a structured audit, and hands the per-prompt outcomes to
//! the scoring aggregator.

mod audit;
mod orchestrator;

pub use audit::{build_audit_prompt, heuristic_metric, parse_audit};
pub use orchestrator::{EvaluationOptions, EvaluationOrchestrator};
