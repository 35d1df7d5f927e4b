//! Wire models sent by the deploy client.

pub mod models;

pub use models::{DeployRequest, DEPLOY_PATH, DEPLOY_TOKEN_HEADER};
