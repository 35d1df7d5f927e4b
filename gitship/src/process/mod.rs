//! Process execution

pub mod runner;

pub use runner::{CommandSpec, ExecutionResult, ProcessRunner, SystemRunner};
