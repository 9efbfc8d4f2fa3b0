//! Stdio driver for the survey flow.
//!
//! This module provides:
//! - JSON-RPC 2.0 framing over line-delimited stdio
//! - `survey/*` method routing onto the orchestrator
//! - Shared application state

mod handlers;
mod rpc;

pub use handlers::*;
pub use rpc::*;

use std::sync::Arc;

use crate::config::Config;
use crate::flow::Orchestrator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// The running survey.
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, orchestrator: Orchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
