//! Session recorder: snapshot delivery and address-bar state.
//!
//! Every trigger sends the full current snapshot, never a delta. Deliveries
//! go through a single worker task so they reach the sink in trigger order;
//! failures are logged and never reach the caller.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use url::Url;

use super::{Session, Snapshot, SnapshotSink};
use crate::answers::AnswerStore;
use crate::error::SinkError;
use crate::graph::QuestionGraph;
use crate::resume::encode_link;

/// Why a snapshot was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTrigger {
    InitialLoad,
    AnswerChanged,
    ForwardSubmit,
}

impl RecordTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordTrigger::InitialLoad => "initial_load",
            RecordTrigger::AnswerChanged => "answer_changed",
            RecordTrigger::ForwardSubmit => "forward_submit",
        }
    }
}

enum Delivery {
    Snapshot(Snapshot, RecordTrigger),
    Flush(oneshot::Sender<()>),
}

/// Records snapshots for one session.
pub struct SessionRecorder {
    session: Session,
    base: Url,
    link: Mutex<Url>,
    record_anonymous: bool,
    queue: Option<mpsc::UnboundedSender<Delivery>>,
}

impl SessionRecorder {
    /// Create a recorder. With a sink, a delivery worker is spawned on the
    /// current tokio runtime.
    pub fn new(
        session: Session,
        base: Url,
        sink: Option<Arc<dyn SnapshotSink>>,
        record_anonymous: bool,
    ) -> Self {
        let queue = sink.map(|sink| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(deliver(sink, rx));
            tx
        });

        Self {
            session,
            link: Mutex::new(base.clone()),
            base,
            record_anonymous,
            queue,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current address-bar link.
    pub fn link(&self) -> Url {
        self.link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether triggers are recorded at all for this session.
    pub fn is_active(&self) -> bool {
        self.session.identity.is_some() || self.record_anonymous
    }

    /// Update the link and enqueue the full snapshot.
    ///
    /// Returns `false` when the session is not recorded.
    pub fn record(
        &self,
        graph: &QuestionGraph,
        answers: &AnswerStore,
        trigger: RecordTrigger,
    ) -> bool {
        if !self.is_active() {
            debug!(trigger = trigger.as_str(), "No identity, snapshot not recorded");
            return false;
        }

        let link = encode_link(
            &self.base,
            graph,
            self.session.identity.as_deref(),
            answers,
        );
        *self.link.lock().unwrap_or_else(PoisonError::into_inner) = link;

        let snapshot = Snapshot::build(&self.session, graph, answers);
        match &self.queue {
            Some(queue) => {
                if queue.send(Delivery::Snapshot(snapshot, trigger)).is_err() {
                    warn!(
                        correlation_id = %self.session.correlation_id,
                        error = %SinkError::Closed,
                        "Snapshot dropped"
                    );
                }
            }
            None => {
                debug!(
                    correlation_id = %self.session.correlation_id,
                    trigger = trigger.as_str(),
                    "No sink configured, snapshot kept local"
                );
            }
        }
        true
    }

    /// Wait until every snapshot enqueued so far has been attempted.
    pub async fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        let (tx, rx) = oneshot::channel();
        if queue.send(Delivery::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn deliver(sink: Arc<dyn SnapshotSink>, mut rx: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = rx.recv().await {
        match delivery {
            Delivery::Snapshot(snapshot, trigger) => {
                match sink.upsert(&snapshot).await {
                    Ok(()) => debug!(
                        correlation_id = %snapshot.correlation_id,
                        trigger = trigger.as_str(),
                        "Snapshot delivered"
                    ),
                    Err(e) => warn!(
                        correlation_id = %snapshot.correlation_id,
                        trigger = trigger.as_str(),
                        error = %e,
                        "Snapshot delivery failed"
                    ),
                }
            }
            Delivery::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Snapshot worker finished");
}
