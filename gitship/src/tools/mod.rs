//! External tool discovery

pub mod locator;
pub mod well_known;

pub use locator::{combined_exec_env, probe, resolve, ToolEnv, ToolPath, ToolSource, ToolSpec, WellKnown};
