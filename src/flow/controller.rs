//! Transition controller.
//!
//! The [`Orchestrator`] owns every piece of mutable flow state behind one
//! lock. Triggers (submit, back, auto-advance, answer edits) take the lock,
//! decide synchronously against the latest answers, release it, then await
//! at most one player call before committing. The lock is never held across
//! an await.
//!
//! Phases:
//!
//! ```text
//! Idle ──submit/back/auto-advance──▶ InFlight ──commit──▶ Idle
//!   └──forward onto terminal──▶ SettlingTerminal ──▶ Idle (terminal flag set)
//! ```
//!
//! Requests while not `Idle` are dropped, never queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Direction, Progress, Scene, StepCursor, TerminalScene, TransitionPlayer};
use crate::answers::{AnswerStore, AnswerValue};
use crate::graph::{Question, QuestionGraph, QuestionId, QuestionKind};
use crate::resume::PrefillRecord;
use crate::session::{RecordTrigger, SessionRecorder};

/// Inline message shown when submit is blocked.
pub const VALIDATION_MESSAGE: &str = "Please complete this question before continuing";

/// Auto-advance delays per question kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    pub scale_delay: Duration,
    pub choice_delay: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            scale_delay: Duration::from_millis(80),
            choice_delay: Duration::from_millis(350),
        }
    }
}

impl FlowConfig {
    /// Delay before a quick pick advances on its own. `None` for kinds
    /// that need an explicit submit.
    pub fn auto_advance_delay(&self, kind: &QuestionKind) -> Option<Duration> {
        match kind {
            QuestionKind::Scale { .. } => Some(self.scale_delay),
            QuestionKind::SingleChoice { .. } => Some(self.choice_delay),
            _ => None,
        }
    }
}

/// Transition state machine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    Idle,
    InFlight,
    SettlingTerminal,
}

/// Non-fatal signal raised when submit finds no answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSignal {
    pub question: QuestionId,
    pub message: String,
}

impl ValidationSignal {
    fn missing_answer(question: QuestionId) -> Self {
        Self {
            question,
            message: VALIDATION_MESSAGE.to_string(),
        }
    }
}

/// Why a trigger had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Another transition is in flight.
    Busy,
    /// The terminal screen is showing.
    Terminal,
    AtFirstQuestion,
    /// The action does not apply to the current question's kind.
    WrongKind,
    /// Out-of-range number or unknown option label.
    InvalidValue,
    /// The auto-advance task was cancelled or replaced.
    Superseded,
    NoQuestion,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Busy => "busy",
            DropReason::Terminal => "terminal",
            DropReason::AtFirstQuestion => "at_first_question",
            DropReason::WrongKind => "wrong_kind",
            DropReason::InvalidValue => "invalid_value",
            DropReason::Superseded => "superseded",
            DropReason::NoQuestion => "no_question",
        }
    }
}

/// Result of a single trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A step move committed.
    Moved {
        from: QuestionId,
        to: QuestionId,
        direction: Direction,
    },
    /// The terminal screen is now showing.
    Finished { terminal: Option<QuestionId> },
    /// Answer recorded and an auto-advance armed.
    Armed { question: QuestionId, delay_ms: u64 },
    /// Answer recorded, no transition scheduled.
    Recorded { question: QuestionId },
    Blocked(ValidationSignal),
    Dropped { reason: DropReason },
}

impl Outcome {
    fn dropped(reason: DropReason) -> Self {
        Outcome::Dropped { reason }
    }
}

/// What is on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Question {
        question: Question,
        #[serde(skip_serializing_if = "Option::is_none")]
        answer: Option<AnswerValue>,
    },
    /// The terminal question over the last step screen.
    Terminal {
        backdrop: Option<Question>,
        terminal: Option<Question>,
    },
}

/// Render-ready snapshot of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub survey: String,
    pub phase: TransitionPhase,
    pub cursor: StepCursor,
    pub screen: Screen,
    pub progress: Progress,
    pub progress_label: String,
    pub progress_percent: f64,
    pub has_answer: bool,
    pub can_go_back: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSignal>,
    pub link: String,
    pub pending_auto_advance: bool,
    pub answers: AnswerStore,
}

struct PendingAdvance {
    ticket: u64,
    question: QuestionId,
    handle: JoinHandle<()>,
}

struct FlowState {
    answers: AnswerStore,
    cursor: StepCursor,
    phase: TransitionPhase,
    pending: Option<PendingAdvance>,
    validation: Option<ValidationSignal>,
    /// Question last committed to the screen.
    on_screen: Option<QuestionId>,
    backdrop: Option<QuestionId>,
    terminal_question: Option<QuestionId>,
    started: bool,
    next_ticket: u64,
}

enum Plan {
    Step {
        from: QuestionId,
        to: QuestionId,
        direction: Direction,
        scene: Scene,
    },
    Terminal {
        scene: TerminalScene,
    },
}

enum Decision {
    Settled(Outcome),
    Run(Plan),
}

struct Inner {
    graph: QuestionGraph,
    config: FlowConfig,
    player: Arc<dyn TransitionPlayer>,
    recorder: SessionRecorder,
    state: Mutex<FlowState>,
}

/// Survey flow orchestrator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator seeded from a resume record.
    ///
    /// The record is trusted as-is; its start index is clamped at
    /// [`start`](Self::start).
    pub fn new(
        graph: QuestionGraph,
        config: FlowConfig,
        player: Arc<dyn TransitionPlayer>,
        recorder: SessionRecorder,
        prefill: PrefillRecord,
    ) -> Self {
        let state = FlowState {
            answers: prefill.answers,
            cursor: StepCursor::at(prefill.start_index),
            phase: TransitionPhase::Idle,
            pending: None,
            validation: None,
            on_screen: None,
            backdrop: None,
            terminal_question: None,
            started: false,
            next_ticket: 0,
        };

        Self {
            inner: Arc::new(Inner {
                graph,
                config,
                player,
                recorder,
                state: Mutex::new(state),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn graph(&self) -> &QuestionGraph {
        &self.inner.graph
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.inner.recorder
    }

    /// Show the first screen and record the initial load.
    pub async fn start(&self) {
        let scene = {
            let mut state = self.lock();
            if state.started {
                return;
            }
            state.started = true;

            let graph = &self.inner.graph;
            let visible = graph.visible_questions(&state.answers);
            let Some(last_open) = visible.iter().rposition(|q| !q.kind.is_terminal()) else {
                state.cursor.terminal = true;
                state.terminal_question = visible.first().map(|q| q.id);
                self.inner
                    .recorder
                    .record(graph, &state.answers, RecordTrigger::InitialLoad);
                warn!(survey = graph.name(), "No askable questions, showing terminal screen");
                return;
            };

            let index = state.cursor.index.min(last_open);
            state.cursor = StepCursor::at(index);
            state.on_screen = Some(visible[index].id);
            state.phase = TransitionPhase::InFlight;

            self.inner
                .recorder
                .record(graph, &state.answers, RecordTrigger::InitialLoad);
            info!(
                survey = graph.name(),
                question_id = %visible[index].id,
                index,
                seeded = state.answers.len(),
                "Survey started"
            );
            Scene::for_question(visible[index])
        };

        self.inner.player.play_enter(&scene).await;
        self.lock().phase = TransitionPhase::Idle;
    }

    /// Pick a scale value or single-choice label and arm auto-advance.
    pub fn select(&self, value: AnswerValue) -> Outcome {
        let mut state = self.lock();
        if let Some(reason) = self.edit_guard(&state, true) {
            return Outcome::dropped(reason);
        }
        let Some(question) = self.current(&state) else {
            return Outcome::dropped(DropReason::NoQuestion);
        };
        let Some(delay) = self.inner.config.auto_advance_delay(&question.kind) else {
            return Outcome::dropped(DropReason::WrongKind);
        };
        if !value.fits(&question.kind) {
            return Outcome::dropped(DropReason::WrongKind);
        }
        if !accepts(question, &value) {
            return Outcome::dropped(DropReason::InvalidValue);
        }

        cancel_pending(&mut state);
        let id = question.id;
        self.apply_answer(&mut state, id, value);
        self.arm(&mut state, id, delay);
        Outcome::Armed {
            question: id,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Flip one label of a multi-choice answer.
    pub fn toggle(&self, label: &str) -> Outcome {
        let mut state = self.lock();
        if let Some(reason) = self.edit_guard(&state, true) {
            return Outcome::dropped(reason);
        }
        let Some(question) = self.current(&state) else {
            return Outcome::dropped(DropReason::NoQuestion);
        };
        let QuestionKind::MultiChoice { options } = &question.kind else {
            return Outcome::dropped(DropReason::WrongKind);
        };
        if !options.iter().any(|o| o == label) {
            return Outcome::dropped(DropReason::InvalidValue);
        }

        let mut labels = state
            .answers
            .get(question.id)
            .and_then(AnswerValue::as_labels)
            .cloned()
            .unwrap_or_default();
        if !labels.remove(label) {
            labels.insert(label.to_string());
        }

        cancel_pending(&mut state);
        let id = question.id;
        self.apply_answer(&mut state, id, AnswerValue::Labels(labels));
        Outcome::Recorded { question: id }
    }

    /// Replace the free-text answer. Accepted during transitions.
    pub fn set_text(&self, text: impl Into<String>) -> Outcome {
        let mut state = self.lock();
        if let Some(reason) = self.edit_guard(&state, false) {
            return Outcome::dropped(reason);
        }
        let Some(question) = self.current(&state) else {
            return Outcome::dropped(DropReason::NoQuestion);
        };
        if !matches!(question.kind, QuestionKind::Text { .. }) {
            return Outcome::dropped(DropReason::WrongKind);
        }

        cancel_pending(&mut state);
        let id = question.id;
        self.apply_answer(&mut state, id, AnswerValue::Text(text.into()));
        Outcome::Recorded { question: id }
    }

    /// Manual forward move. Cancels any pending auto-advance first.
    pub async fn submit(&self) -> Outcome {
        let decision = {
            let mut state = self.lock();
            match self.transition_guard(&state) {
                Some(reason) => Decision::Settled(Outcome::dropped(reason)),
                None => {
                    cancel_pending(&mut state);
                    self.plan_forward(&mut state)
                }
            }
        };
        self.run(decision).await
    }

    /// Move to the nearest earlier visible question.
    pub async fn back(&self) -> Outcome {
        let decision = {
            let mut state = self.lock();
            match self.transition_guard(&state) {
                Some(reason) => Decision::Settled(Outcome::dropped(reason)),
                None => {
                    cancel_pending(&mut state);
                    self.plan_back(&mut state)
                }
            }
        };
        self.run(decision).await
    }

    /// Body of an armed auto-advance task.
    ///
    /// Runs only if `ticket` is still the pending one; every value is read
    /// fresh from the state.
    async fn fire_auto_advance(&self, ticket: u64) -> Outcome {
        let decision = {
            let mut state = self.lock();
            let armed = state.pending.as_ref().map(|p| (p.ticket, p.question));
            match armed {
                Some((armed_ticket, question)) if armed_ticket == ticket => {
                    debug!(question_id = %question, ticket, "Auto-advance fired");
                    state.pending = None;
                    match self.transition_guard(&state) {
                        Some(reason) => Decision::Settled(Outcome::dropped(reason)),
                        None => self.plan_forward(&mut state),
                    }
                }
                _ => Decision::Settled(Outcome::dropped(DropReason::Superseded)),
            }
        };
        self.run(decision).await
    }

    /// Cancel any pending auto-advance and flush the recorder.
    pub async fn shutdown(&self) {
        {
            let mut state = self.lock();
            cancel_pending(&mut state);
        }
        self.inner.recorder.flush().await;
        debug!("Orchestrator shut down");
    }

    async fn run(&self, decision: Decision) -> Outcome {
        match decision {
            Decision::Settled(outcome) => {
                if let Outcome::Dropped { reason } = &outcome {
                    debug!(reason = reason.as_str(), "Transition dropped");
                }
                outcome
            }
            Decision::Run(plan) => self.execute(plan).await,
        }
    }

    async fn execute(&self, plan: Plan) -> Outcome {
        match plan {
            Plan::Step {
                from,
                to,
                direction,
                scene,
            } => {
                self.inner.player.play_exit(&scene, direction).await;
                self.commit_step(from, to, direction)
            }
            Plan::Terminal { scene } => {
                self.inner.player.play_terminal_crossfade(&scene).await;
                let mut state = self.lock();
                state.phase = TransitionPhase::Idle;
                info!(terminal = ?state.terminal_question, "Survey finished");
                Outcome::Finished {
                    terminal: state.terminal_question,
                }
            }
        }
    }

    fn commit_step(&self, from: QuestionId, to: QuestionId, direction: Direction) -> Outcome {
        let mut state = self.lock();
        let graph = &self.inner.graph;
        let visible = graph.visible_questions(&state.answers);

        // The target may have been hidden by an edit made during the exit
        let index = match visible.iter().position(|q| q.id == to) {
            Some(index) => index,
            None => nearest_at_or_before(graph, &visible, to).unwrap_or(0),
        };
        let landed = visible.get(index).map_or(to, |q| q.id);

        state.cursor = StepCursor::at(index);
        state.on_screen = Some(landed);
        state.phase = TransitionPhase::Idle;
        state.validation = None;

        info!(from = %from, to = %landed, ?direction, index, "Step committed");
        Outcome::Moved {
            from,
            to: landed,
            direction,
        }
    }

    fn plan_forward(&self, state: &mut FlowState) -> Decision {
        let graph = &self.inner.graph;
        let visible = graph.visible_questions(&state.answers);
        let Some(index) = self.current_index(state, &visible) else {
            return Decision::Settled(Outcome::dropped(DropReason::NoQuestion));
        };
        let current = visible[index];

        if !state.answers.has_answer(current) {
            let signal = ValidationSignal::missing_answer(current.id);
            info!(question_id = %current.id, "Submit blocked, answer missing");
            state.validation = Some(signal.clone());
            return Decision::Settled(Outcome::Blocked(signal));
        }

        self.inner
            .recorder
            .record(graph, &state.answers, RecordTrigger::ForwardSubmit);

        match visible.get(index + 1) {
            Some(next) if !next.kind.is_terminal() && !current.kind.is_terminal() => {
                state.phase = TransitionPhase::InFlight;
                debug!(from = %current.id, to = %next.id, "Forward transition started");
                Decision::Run(Plan::Step {
                    from: current.id,
                    to: next.id,
                    direction: Direction::Forward,
                    scene: Scene::for_question(current),
                })
            }
            next => {
                let terminal = next
                    .copied()
                    .filter(|q| q.kind.is_terminal())
                    .or_else(|| visible[index..].iter().copied().find(|q| q.kind.is_terminal()))
                    .or_else(|| graph.questions().iter().find(|q| q.kind.is_terminal()));
                let backdrop = (!current.kind.is_terminal()).then_some(current.id);

                state.cursor.terminal = true;
                state.phase = TransitionPhase::SettlingTerminal;
                state.validation = None;
                state.backdrop = backdrop;
                state.terminal_question = terminal.map(|q| q.id);

                debug!(from = %current.id, terminal = ?state.terminal_question, "Terminal transition started");
                Decision::Run(Plan::Terminal {
                    scene: TerminalScene {
                        backdrop,
                        terminal: state.terminal_question,
                        elements: 2 + terminal.map_or(0, |q| usize::from(q.subtitle.is_some())),
                    },
                })
            }
        }
    }

    fn plan_back(&self, state: &mut FlowState) -> Decision {
        let graph = &self.inner.graph;
        let visible = graph.visible_questions(&state.answers);
        let Some(index) = self.current_index(state, &visible) else {
            return Decision::Settled(Outcome::dropped(DropReason::NoQuestion));
        };
        let current = visible[index];

        // A hidden on-screen question backs onto the last visible one declared before it
        let target = match state.on_screen {
            Some(id) if id != current.id => nearest_before(graph, &visible, id),
            _ => index.checked_sub(1),
        };
        let Some(target) = target else {
            return Decision::Settled(Outcome::dropped(DropReason::AtFirstQuestion));
        };

        state.phase = TransitionPhase::InFlight;
        debug!(from = %current.id, to = %visible[target].id, "Back transition started");
        Decision::Run(Plan::Step {
            from: state.on_screen.unwrap_or(current.id),
            to: visible[target].id,
            direction: Direction::Backward,
            scene: Scene::for_question(current),
        })
    }

    /// Position of the on-screen question in `visible`, clamped.
    fn current_index(&self, state: &FlowState, visible: &[&Question]) -> Option<usize> {
        if visible.is_empty() {
            return None;
        }
        let committed = state
            .on_screen
            .and_then(|id| visible.iter().position(|q| q.id == id));
        Some(committed.unwrap_or_else(|| state.cursor.clamped(visible.len())))
    }

    fn current<'a>(&'a self, state: &FlowState) -> Option<&'a Question> {
        let visible = self.inner.graph.visible_questions(&state.answers);
        let index = self.current_index(state, &visible)?;
        Some(visible[index])
    }

    fn edit_guard(&self, state: &FlowState, needs_idle: bool) -> Option<DropReason> {
        if state.cursor.terminal {
            Some(DropReason::Terminal)
        } else if needs_idle && state.phase != TransitionPhase::Idle {
            Some(DropReason::Busy)
        } else {
            None
        }
    }

    fn transition_guard(&self, state: &FlowState) -> Option<DropReason> {
        self.edit_guard(state, true)
    }

    fn apply_answer(&self, state: &mut FlowState, id: QuestionId, value: AnswerValue) {
        debug!(question_id = %id, value = %value, "Answer recorded");
        state.answers.set(id, value);
        state.validation = None;
        self.inner
            .recorder
            .record(&self.inner.graph, &state.answers, RecordTrigger::AnswerChanged);
    }

    fn arm(&self, state: &mut FlowState, question: QuestionId, delay: Duration) {
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = orchestrator.fire_auto_advance(ticket).await;
            debug!(ticket, ?outcome, "Auto-advance finished");
        });

        debug!(question_id = %question, ticket, delay_ms = delay.as_millis(), "Auto-advance armed");
        state.pending = Some(PendingAdvance {
            ticket,
            question,
            handle,
        });
    }

    /// Render-ready view of the current state.
    pub fn view(&self) -> ViewState {
        let state = self.lock();
        let graph = &self.inner.graph;
        let visible = graph.visible_questions(&state.answers);
        let index = self.current_index(&state, &visible);

        let mut cursor = state.cursor;
        if let Some(index) = index {
            cursor.index = index;
        }
        let progress = Progress::compute(&visible, &cursor);

        let (screen, has_answer) = if state.cursor.terminal {
            let screen = Screen::Terminal {
                backdrop: state.backdrop.and_then(|id| graph.get(id)).cloned(),
                terminal: state.terminal_question.and_then(|id| graph.get(id)).cloned(),
            };
            (screen, true)
        } else {
            match index.map(|i| visible[i]) {
                Some(question) => (
                    Screen::Question {
                        question: question.clone(),
                        answer: state.answers.get(question.id).cloned(),
                    },
                    state.answers.has_answer(question),
                ),
                None => (
                    Screen::Terminal {
                        backdrop: None,
                        terminal: None,
                    },
                    false,
                ),
            }
        };

        ViewState {
            survey: graph.name().to_string(),
            phase: state.phase,
            cursor,
            screen,
            progress,
            progress_label: progress.label(),
            progress_percent: progress.percent(),
            has_answer,
            can_go_back: !state.cursor.terminal
                && state.phase == TransitionPhase::Idle
                && index.is_some_and(|i| i > 0),
            validation: state.validation.clone(),
            link: self.inner.recorder.link().to_string(),
            pending_auto_advance: state.pending.is_some(),
            answers: state.answers.clone(),
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.lock().phase
    }

    pub fn cursor(&self) -> StepCursor {
        let state = self.lock();
        let visible = self.inner.graph.visible_questions(&state.answers);
        let mut cursor = state.cursor;
        if let Some(index) = self.current_index(&state, &visible) {
            cursor.index = index;
        }
        cursor
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().cursor.terminal
    }

    pub fn progress(&self) -> Progress {
        self.view().progress
    }

    pub fn answers(&self) -> AnswerStore {
        self.lock().answers.clone()
    }

    /// Id of the question on screen, `None` on the terminal screen.
    pub fn current_question(&self) -> Option<QuestionId> {
        let state = self.lock();
        if state.cursor.terminal {
            return None;
        }
        self.current(&state).map(|q| q.id)
    }

    /// Ids of the currently visible questions.
    pub fn visible_ids(&self) -> Vec<QuestionId> {
        let state = self.lock();
        self.inner
            .graph
            .visible_questions(&state.answers)
            .iter()
            .map(|q| q.id)
            .collect()
    }

    pub fn validation(&self) -> Option<ValidationSignal> {
        self.lock().validation.clone()
    }

    pub fn has_pending_advance(&self) -> bool {
        self.lock().pending.is_some()
    }
}

fn cancel_pending(state: &mut FlowState) {
    if let Some(pending) = state.pending.take() {
        pending.handle.abort();
        debug!(question_id = %pending.question, ticket = pending.ticket, "Auto-advance cancelled");
    }
}

/// Whether a picked value is within the question's range or options.
fn accepts(question: &Question, value: &AnswerValue) -> bool {
    match (&question.kind, value) {
        (QuestionKind::Scale { min, max, .. }, AnswerValue::Number(n)) => (*min..=*max).contains(n),
        (QuestionKind::SingleChoice { options }, AnswerValue::Label(label)) => {
            options.iter().any(|o| o == label)
        }
        _ => false,
    }
}

/// Last visible position declared strictly before `id`.
fn nearest_before(graph: &QuestionGraph, visible: &[&Question], id: QuestionId) -> Option<usize> {
    let position = graph.position(id)?;
    visible
        .iter()
        .rposition(|q| graph.position(q.id).is_some_and(|p| p < position))
}

/// Last visible position declared at or before `id`.
fn nearest_at_or_before(
    graph: &QuestionGraph,
    visible: &[&Question],
    id: QuestionId,
) -> Option<usize> {
    let position = graph.position(id)?;
    visible
        .iter()
        .rposition(|q| graph.position(q.id).is_some_and(|p| p <= position))
}
