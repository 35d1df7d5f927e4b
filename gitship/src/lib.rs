//! gitship library
//!
//! Client-side deploy stages (frontend build, git sync, deploy trigger) and
//! the server-side deploy endpoint they call.

pub mod app;
pub mod cli;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod process;
pub mod server;
pub mod tools;
pub mod utils;
