//! Deploy endpoint server

pub mod console;
pub mod handlers;
pub mod pipeline;
pub mod serve;
pub mod state;

pub use pipeline::DeployHandler;
pub use serve::{router, serve};
pub use state::ServerState;
