//! Client-side deploy stages

pub mod build;
pub mod confirm;
pub mod git;
pub mod narrator;
pub mod notifier;
pub mod orchestrator;

pub use orchestrator::{DeployOrchestrator, DeployOutcome};
