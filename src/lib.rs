//! # Survey Flow
//!
//! Orchestrates a single respondent through a branching survey: decides
//! which question comes next from a declarative question graph, serializes
//! every step transition, and records the full answer snapshot for the
//! visit on each change.
//!
//! ## Features
//!
//! - **Declarative branching**: visibility gates as data (`between`, `>=`,
//!   `<=`, `equalsOneOf`), including gates on a designated score question
//! - **Race-free transitions**: at most one transition in flight; timed
//!   auto-advance is cancelled by any later manual action
//! - **Session snapshots**: full-snapshot, fire-and-forget upserts keyed by a
//!   per-visit correlation id, plus a resumable address-bar link
//! - **Resume links**: `q<id>=` parameters, legacy index form and score alias
//!
//! ## Architecture
//!
//! ```text
//! answer event → AnswerStore → visible sequence → Orchestrator → TransitionPlayer
//!                                                      ↓
//!                                              SessionRecorder → SnapshotSink (HTTP)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use survey_flow::flow::{FlowConfig, InstantPlayer, Orchestrator};
//! use survey_flow::graph::nps_graph;
//! use survey_flow::resume::PrefillRecord;
//! use survey_flow::session::{Session, SessionRecorder};
//!
//! let graph = nps_graph()?;
//! let base = url::Url::parse("https://example.com/nps")?;
//! let prefill = PrefillRecord::from_url(&graph, &base);
//! let recorder = SessionRecorder::new(Session::new(prefill.identity.clone()), base, None, false);
//! let flow = Orchestrator::new(graph, FlowConfig::default(), Arc::new(InstantPlayer), recorder, prefill);
//! flow.start().await;
//! ```

/// Answer store and answer values.
pub mod answers;
/// Configuration loaded from the environment.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Step cursor, transition player and the orchestrator.
pub mod flow;
/// Question graph, visibility gates and built-in surveys.
pub mod graph;
/// Resume-link parsing and address-bar encoding.
pub mod resume;
/// JSON-RPC stdio driver.
pub mod server;
/// Visit session, snapshots and the recorder.
pub mod session;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use flow::Orchestrator;
pub use server::{AppState, SharedState, SurveyServer};
