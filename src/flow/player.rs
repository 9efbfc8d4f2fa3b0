//! Transition player: the opaque, awaitable visual layer.
//!
//! The orchestrator never inspects an animation; it awaits one call per
//! transition and commits the cursor once the call returns.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::trace;

use crate::graph::{Question, QuestionId, QuestionKind};

/// Direction of a step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// The outgoing step screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub question: QuestionId,
    /// Number of independently animated elements.
    pub elements: usize,
}

impl Scene {
    /// Heading, optional subtitle, the answer area, and a submit button for
    /// kinds that need one.
    pub fn for_question(question: &Question) -> Self {
        let has_button = matches!(
            question.kind,
            QuestionKind::Scale { .. } | QuestionKind::Text { .. } | QuestionKind::MultiChoice { .. }
        );
        Self {
            question: question.id,
            elements: 2 + usize::from(question.subtitle.is_some()) + usize::from(has_button),
        }
    }
}

/// The crossfade from the last step screen into the terminal screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalScene {
    /// Last non-terminal question, kept rendered underneath.
    pub backdrop: Option<QuestionId>,
    pub terminal: Option<QuestionId>,
    /// Logo, heading, body.
    pub elements: usize,
}

#[async_trait]
pub trait TransitionPlayer: Send + Sync {
    /// Animate the current step out.
    async fn play_exit(&self, scene: &Scene, direction: Direction);
    /// Animate a step in.
    async fn play_enter(&self, scene: &Scene);
    /// Crossfade into the terminal screen.
    async fn play_terminal_crossfade(&self, scene: &TerminalScene);
}

/// Completes every transition immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantPlayer;

#[async_trait]
impl TransitionPlayer for InstantPlayer {
    async fn play_exit(&self, _scene: &Scene, _direction: Direction) {}

    async fn play_enter(&self, _scene: &Scene) {}

    async fn play_terminal_crossfade(&self, _scene: &TerminalScene) {}
}

const STAGGER_IN: f64 = 0.07;
const STAGGER_OUT: f64 = 0.04;
const DURATION_IN: f64 = 0.55;
const DURATION_OUT: f64 = 0.28;
const ENTER_DELAY: f64 = 0.08;
const CROSSFADE_ITEMS_AT: f64 = 0.4;
const CROSSFADE_STAGGER: f64 = 0.12;
const CROSSFADE_ITEM_DURATION: f64 = 0.7;
const CROSSFADE_OVERLAY_END: f64 = 0.15 + 0.8;

/// Waits as long as the staggered animations would take.
#[derive(Debug, Clone, Copy)]
pub struct PacedPlayer {
    pace: f64,
}

impl PacedPlayer {
    /// `pace` scales every timing; `0.0` behaves like [`InstantPlayer`].
    pub fn new(pace: f64) -> Self {
        Self {
            pace: pace.max(0.0),
        }
    }

    pub fn exit_duration(&self, elements: usize) -> Duration {
        self.scaled(DURATION_OUT + STAGGER_OUT * elements.saturating_sub(1) as f64)
    }

    pub fn enter_duration(&self, elements: usize) -> Duration {
        self.scaled(ENTER_DELAY + DURATION_IN + STAGGER_IN * elements.saturating_sub(1) as f64)
    }

    pub fn crossfade_duration(&self, elements: usize) -> Duration {
        let items_end = CROSSFADE_ITEMS_AT
            + CROSSFADE_STAGGER * elements.saturating_sub(1) as f64
            + CROSSFADE_ITEM_DURATION;
        self.scaled(items_end.max(CROSSFADE_OVERLAY_END))
    }

    fn scaled(&self, seconds: f64) -> Duration {
        Duration::from_secs_f64(seconds * self.pace)
    }
}

impl Default for PacedPlayer {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl TransitionPlayer for PacedPlayer {
    async fn play_exit(&self, scene: &Scene, direction: Direction) {
        let wait = self.exit_duration(scene.elements);
        trace!(question_id = %scene.question, ?direction, wait_ms = wait.as_millis(), "Playing exit");
        tokio::time::sleep(wait).await;
    }

    async fn play_enter(&self, scene: &Scene) {
        let wait = self.enter_duration(scene.elements);
        trace!(question_id = %scene.question, wait_ms = wait.as_millis(), "Playing enter");
        tokio::time::sleep(wait).await;
    }

    async fn play_terminal_crossfade(&self, scene: &TerminalScene) {
        let wait = self.crossfade_duration(scene.elements);
        trace!(wait_ms = wait.as_millis(), "Playing terminal crossfade");
        tokio::time::sleep(wait).await;
    }
}
