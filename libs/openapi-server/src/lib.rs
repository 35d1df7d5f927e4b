//! Wire models returned by the deploy endpoint.

pub mod models;

pub use models::{
    DeployReport, DeployResponse, HealthResponse, StepKind, StepResult, StepStatus, ToolPathInfo,
};
