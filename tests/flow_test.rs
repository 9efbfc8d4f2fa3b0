//! Orchestrator integration tests
//!
//! Transitions are driven on a paused tokio clock so auto-advance delays and
//! player durations interleave deterministically.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use url::Url;

use survey_flow::answers::AnswerValue;
use survey_flow::error::SinkResult;
use survey_flow::flow::{
    Direction, DropReason, FlowConfig, Orchestrator, Outcome, Scene, StepCursor, TerminalScene,
    TransitionPhase, TransitionPlayer, VALIDATION_MESSAGE,
};
use survey_flow::graph::{nps_graph, subscription_graph, QuestionGraph, QuestionId};
use survey_flow::resume::PrefillRecord;
use survey_flow::session::{Session, SessionRecorder, Snapshot, SnapshotSink};

const PLAYER_DELAY: Duration = Duration::from_millis(100);

/// Player that takes a fixed time per call and tracks overlap.
#[derive(Default)]
struct RecordingPlayer {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingPlayer {
    async fn play(&self, name: &'static str) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(PLAYER_DELAY).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(name);
    }

    fn count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == name)
            .count()
    }

    fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransitionPlayer for RecordingPlayer {
    async fn play_exit(&self, _scene: &Scene, _direction: Direction) {
        self.play("exit").await;
    }

    async fn play_enter(&self, _scene: &Scene) {
        self.play("enter").await;
    }

    async fn play_terminal_crossfade(&self, _scene: &TerminalScene) {
        self.play("crossfade").await;
    }
}

#[derive(Default)]
struct RecordingSink {
    received: Mutex<Vec<Snapshot>>,
}

#[async_trait]
impl SnapshotSink for RecordingSink {
    async fn upsert(&self, snapshot: &Snapshot) -> SinkResult<()> {
        self.received.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

struct Harness {
    flow: Orchestrator,
    player: Arc<RecordingPlayer>,
    sink: Arc<RecordingSink>,
}

fn harness(graph: QuestionGraph, link: &str) -> Harness {
    let link = Url::parse(link).unwrap();
    let prefill = PrefillRecord::from_url(&graph, &link);
    let mut base = link.clone();
    base.set_query(None);

    let player = Arc::new(RecordingPlayer::default());
    let sink = Arc::new(RecordingSink::default());
    let recorder = SessionRecorder::new(
        Session::new(prefill.identity.clone()),
        base,
        Some(sink.clone() as Arc<dyn SnapshotSink>),
        false,
    );
    let flow = Orchestrator::new(graph, FlowConfig::default(), player.clone(), recorder, prefill);

    Harness { flow, player, sink }
}

async fn started(graph: QuestionGraph, link: &str) -> Harness {
    let h = harness(graph, link);
    h.flow.start().await;
    h
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

const NPS: &str = "https://survey.test/nps?email=a%40b.c";
const SUBSCRIPTION: &str = "https://survey.test/subscription?email=a%40b.c";

// ============================================================================
// Auto-advance
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_auto_advance_fires_after_delay() {
    let h = started(nps_graph().unwrap(), NPS).await;

    assert_eq!(
        h.flow.select(AnswerValue::Number(8)),
        Outcome::Armed {
            question: QuestionId(1),
            delay_ms: 80
        }
    );

    advance(79).await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(1)));
    assert!(h.flow.has_pending_advance());

    advance(200).await;
    // Score 8 routes to the passive follow-up
    assert_eq!(h.flow.current_question(), Some(QuestionId(3)));
    assert!(!h.flow.has_pending_advance());
    assert_eq!(h.player.count("exit"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_arm_then_submit_moves_exactly_once() {
    let h = started(nps_graph().unwrap(), NPS).await;

    h.flow.select(AnswerValue::Number(3));
    assert_eq!(
        h.flow.submit().await,
        Outcome::Moved {
            from: QuestionId(1),
            to: QuestionId(2),
            direction: Direction::Forward
        }
    );

    advance(1000).await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(2)));
    assert_eq!(h.player.count("exit"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reselect_replaces_pending_timer() {
    let h = started(nps_graph().unwrap(), NPS).await;

    h.flow.select(AnswerValue::Number(3));
    advance(50).await;
    h.flow.select(AnswerValue::Number(9));

    // The first timer would have fired by now
    advance(50).await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(1)));
    assert!(h.flow.has_pending_advance());

    advance(300).await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(4)));
    assert_eq!(h.player.count("exit"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_back_cancels_stale_timer() {
    let h = started(subscription_graph().unwrap(), SUBSCRIPTION).await;

    h.flow.select(AnswerValue::Label("Neutral".to_string()));
    h.flow.submit().await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(2)));

    h.flow.select(AnswerValue::Label("Likely".to_string()));
    assert_eq!(
        h.flow.back().await,
        Outcome::Moved {
            from: QuestionId(2),
            to: QuestionId(1),
            direction: Direction::Backward
        }
    );

    advance(2000).await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(1)));
    assert_eq!(h.player.count("exit"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_advance() {
    let h = started(nps_graph().unwrap(), NPS).await;

    h.flow.select(AnswerValue::Number(10));
    h.flow.shutdown().await;

    advance(1000).await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(1)));
    assert_eq!(h.player.count("exit"), 0);
}

// ============================================================================
// Mutual exclusion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_triggers_admit_one_transition() {
    let h = started(subscription_graph().unwrap(), SUBSCRIPTION).await;
    h.flow.select(AnswerValue::Label("Neutral".to_string()));

    let (first, second, third) = tokio::join!(h.flow.submit(), h.flow.submit(), h.flow.back());

    assert!(matches!(first, Outcome::Moved { .. }));
    assert_eq!(second, Outcome::Dropped { reason: DropReason::Busy });
    assert_eq!(third, Outcome::Dropped { reason: DropReason::Busy });

    advance(1000).await;
    assert_eq!(h.player.count("exit"), 1);
    assert_eq!(h.player.max_active(), 1);
    assert_eq!(h.flow.current_question(), Some(QuestionId(2)));
}

#[tokio::test(start_paused = true)]
async fn test_adversarial_interleaving_never_overlaps() {
    let h = started(subscription_graph().unwrap(), SUBSCRIPTION).await;

    let mut tasks = Vec::new();
    for round in 0..12u64 {
        let flow = h.flow.clone();
        tasks.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(round * 37)).await;
            match round % 4 {
                0 => {
                    flow.select(AnswerValue::Label("Unsure".to_string()));
                    flow.select(AnswerValue::Label("Neutral".to_string()));
                }
                1 => {
                    flow.submit().await;
                }
                2 => {
                    flow.back().await;
                }
                _ => {
                    flow.select(AnswerValue::Label("Unlikely".to_string()));
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    advance(2000).await;

    assert_eq!(h.player.max_active(), 1);
    assert_eq!(h.flow.phase(), TransitionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_selection_dropped_while_settling_terminal() {
    let h = started(nps_graph().unwrap(), NPS).await;
    h.flow.select(AnswerValue::Number(2));
    h.flow.submit().await;
    h.flow.set_text("too slow");

    let flow = h.flow.clone();
    let submit = tokio::spawn(async move { flow.submit().await });
    advance(10).await;

    assert_eq!(h.flow.phase(), TransitionPhase::SettlingTerminal);
    assert_eq!(
        h.flow.select(AnswerValue::Number(5)),
        Outcome::Dropped {
            reason: DropReason::Terminal
        }
    );

    assert_eq!(
        submit.await.unwrap(),
        Outcome::Finished {
            terminal: Some(QuestionId(5))
        }
    );
    assert_eq!(h.flow.phase(), TransitionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_edits_during_step_move() {
    let h = started(nps_graph().unwrap(), NPS).await;
    h.flow.select(AnswerValue::Number(2));

    let flow = h.flow.clone();
    let submit = tokio::spawn(async move { flow.submit().await });
    advance(10).await;

    assert_eq!(h.flow.phase(), TransitionPhase::InFlight);
    assert_eq!(
        h.flow.select(AnswerValue::Number(9)),
        Outcome::Dropped {
            reason: DropReason::Busy
        }
    );
    assert_eq!(
        h.flow.back().await,
        Outcome::Dropped {
            reason: DropReason::Busy
        }
    );

    assert!(matches!(submit.await.unwrap(), Outcome::Moved { .. }));
    assert_eq!(h.flow.answers().get(QuestionId(1)), Some(&AnswerValue::Number(2)));
}

// ============================================================================
// Validation, progress and terminal screen
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_submit_without_answer_blocks() {
    let h = started(nps_graph().unwrap(), NPS).await;
    h.flow.select(AnswerValue::Number(1));
    h.flow.submit().await;

    h.flow.set_text("");
    match h.flow.submit().await {
        Outcome::Blocked(signal) => {
            assert_eq!(signal.question, QuestionId(2));
            assert_eq!(signal.message, VALIDATION_MESSAGE);
        }
        other => panic!("expected block, got {:?}", other),
    }
    assert_eq!(h.flow.cursor(), StepCursor::at(1));
    assert_eq!(h.flow.phase(), TransitionPhase::Idle);
    assert!(h.flow.view().validation.is_some());
    assert_eq!(h.player.count("exit"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_progress_denominator_tracks_gates() {
    let h = started(subscription_graph().unwrap(), SUBSCRIPTION).await;
    assert_eq!(h.flow.view().progress_label, "1 of 2");

    h.flow.select(AnswerValue::Label("Satisfied".to_string()));
    h.flow.submit().await;
    h.flow.select(AnswerValue::Label("Unlikely".to_string()));
    let with_reason = h.flow.progress();
    assert_eq!((with_reason.step, with_reason.total), (2, 3));

    h.flow.select(AnswerValue::Label("Likely".to_string()));
    let without_reason = h.flow.progress();
    assert!(without_reason.total < with_reason.total);
    assert_eq!((without_reason.step, without_reason.total), (2, 2));
    assert!(h.flow.view().progress_percent <= 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_nps_flow_reaches_terminal() {
    let h = started(nps_graph().unwrap(), NPS).await;

    h.flow.select(AnswerValue::Number(10));
    advance(500).await;
    assert_eq!(h.flow.current_question(), Some(QuestionId(4)));
    assert_eq!(h.flow.visible_ids(), vec![QuestionId(1), QuestionId(4), QuestionId(5)]);

    h.flow.set_text("the scent");
    assert_eq!(
        h.flow.submit().await,
        Outcome::Finished {
            terminal: Some(QuestionId(5))
        }
    );
    assert!(h.flow.is_terminal());
    assert_eq!(h.player.count("crossfade"), 1);
    assert_eq!(h.flow.view().progress_label, "Complete!");

    assert_eq!(
        h.flow.submit().await,
        Outcome::Dropped {
            reason: DropReason::Terminal
        }
    );
    assert_eq!(
        h.flow.back().await,
        Outcome::Dropped {
            reason: DropReason::Terminal
        }
    );
}

// ============================================================================
// Recording and resume
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_trigger_sends_full_snapshot() {
    let h = started(subscription_graph().unwrap(), SUBSCRIPTION).await;
    h.flow.select(AnswerValue::Label("Neutral".to_string()));
    h.flow.submit().await;
    h.flow.shutdown().await;

    let received = h.sink.received.lock().unwrap();
    // initial load, answer change, forward submit
    assert_eq!(received.len(), 3);
    assert!(received
        .iter()
        .all(|s| s.correlation_id == received[0].correlation_id));
    assert_eq!(received[0].fields["q1"], "");
    assert_eq!(received[2].fields["q1"], "Neutral");
    assert_eq!(received[2].fields.len(), 3);
    assert_eq!(received[2].email, "a@b.c");
}

#[tokio::test(start_paused = true)]
async fn test_anonymous_visit_records_nothing() {
    let h = started(subscription_graph().unwrap(), "https://survey.test/subscription").await;
    h.flow.select(AnswerValue::Label("Neutral".to_string()));
    h.flow.shutdown().await;

    assert!(h.sink.received.lock().unwrap().is_empty());
    assert_eq!(h.flow.view().link, "https://survey.test/subscription");
}

#[tokio::test(start_paused = true)]
async fn test_resume_starts_after_seeded_answer() {
    let h = started(
        subscription_graph().unwrap(),
        "https://survey.test/subscription?email=a%40b.c&q1=Neutral",
    )
    .await;

    assert_eq!(h.flow.current_question(), Some(QuestionId(2)));
    let view = h.flow.view();
    assert!(view.link.contains("q1=Neutral"));
    assert!(view.can_go_back);

    h.flow.shutdown().await;
    let received = h.sink.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].fields["q1"], "Neutral");
}

#[tokio::test(start_paused = true)]
async fn test_malformed_resume_starts_fresh_with_identity() {
    let h = started(
        nps_graph().unwrap(),
        "https://survey.test/nps?email=a%40b.c&q1=eleven",
    )
    .await;

    assert_eq!(h.flow.current_question(), Some(QuestionId(1)));
    assert!(h.flow.answers().is_empty());
    assert_eq!(h.flow.view().link, "https://survey.test/nps?email=a%40b.c");
}
