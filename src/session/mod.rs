//! Visit session and snapshot recording.
//!
//! This module provides:
//! - [`Session`]: one correlation id per visit plus the optional identity
//! - [`Snapshot`]: the full current answer set keyed by fixed field names
//! - [`SnapshotSink`]: the outbound upsert-by-correlation-id endpoint
//! - [`SessionRecorder`]: fire-and-forget delivery and the address-bar link

mod recorder;
mod sink;

pub use recorder::*;
pub use sink::*;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::answers::AnswerStore;
use crate::graph::QuestionGraph;

/// A single visit. Lives for the orchestrator's lifetime and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// Opaque token generated once per visit.
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(identity: Option<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().simple().to_string(),
            identity,
            started_at: Utc::now(),
        }
    }
}

/// Full answer snapshot sent on every recorder trigger.
///
/// Every non-terminal question contributes its payload field, so a later
/// snapshot never omits a field an earlier one carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub survey: String,
    #[serde(rename = "sessionId")]
    pub correlation_id: String,
    pub email: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl Snapshot {
    /// Build from the latest answers.
    ///
    /// When several questions share a field, the visible answered one wins,
    /// then any answered one in declaration order, else the empty string.
    pub fn build(session: &Session, graph: &QuestionGraph, answers: &AnswerStore) -> Self {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        let mut settled = BTreeSet::new();

        for question in graph.questions().iter().filter(|q| !q.kind.is_terminal()) {
            let field = question.field_name();
            let value = answers
                .get(question.id)
                .filter(|v| v.fits(&question.kind) && v.is_present())
                .map(ToString::to_string);

            match value {
                Some(_) if settled.contains(&field) => {}
                Some(value) if graph.is_visible(question, answers) => {
                    settled.insert(field.clone());
                    fields.insert(field, value);
                }
                Some(value) => {
                    let slot = fields.entry(field).or_default();
                    if slot.is_empty() {
                        *slot = value;
                    }
                }
                None => {
                    fields.entry(field).or_default();
                }
            }
        }

        Self {
            survey: graph.name().to_string(),
            correlation_id: session.correlation_id.clone(),
            email: session.identity.clone().unwrap_or_default(),
            fields,
        }
    }
}
