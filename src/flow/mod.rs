//! Survey flow: step cursor, transition player, and the orchestrator.
//!
//! This module provides:
//! - [`StepCursor`] and [`Progress`]: what is on screen and how far along it is
//! - [`TransitionPlayer`]: the awaited visual layer ([`PacedPlayer`], [`InstantPlayer`])
//! - [`Orchestrator`]: the transition state machine arbitrating submit,
//!   timed auto-advance, and back navigation

mod controller;
mod cursor;
mod player;

pub use controller::*;
pub use cursor::*;
pub use player::*;
