//! Answer store: the respondent's current answer per question.
//!
//! Every mutation overwrites one key entirely; there are no partial merges.
//! Answers to questions that later become hidden are retained.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::graph::{Question, QuestionId, QuestionKind};

/// Delimiter used when a choice set is flattened to a single string.
pub const LIST_DELIMITER: char = '|';

/// A recorded answer, tagged by shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Scale pick.
    Number(i64),
    /// Single-choice pick.
    Label(String),
    /// Multi-choice picks; order is irrelevant.
    Labels(BTreeSet<String>),
    /// Free text.
    Text(String),
}

impl AnswerValue {
    /// Build a choice set.
    pub fn labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::Labels(labels.into_iter().map(Into::into).collect())
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Label(s) | AnswerValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_labels(&self) -> Option<&BTreeSet<String>> {
        match self {
            AnswerValue::Labels(set) => Some(set),
            _ => None,
        }
    }

    /// Whether this value has the shape `kind` expects.
    pub fn fits(&self, kind: &QuestionKind) -> bool {
        matches!(
            (kind, self),
            (QuestionKind::Scale { .. }, AnswerValue::Number(_))
                | (QuestionKind::SingleChoice { .. }, AnswerValue::Label(_))
                | (QuestionKind::MultiChoice { .. }, AnswerValue::Labels(_))
                | (QuestionKind::Text { .. }, AnswerValue::Text(_))
        )
    }

    /// Presence check appropriate to the value's shape.
    pub fn is_present(&self) -> bool {
        match self {
            AnswerValue::Number(_) => true,
            AnswerValue::Label(s) | AnswerValue::Text(s) => !s.is_empty(),
            AnswerValue::Labels(set) => !set.is_empty(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(n) => write!(f, "{}", n),
            AnswerValue::Label(s) | AnswerValue::Text(s) => f.write_str(s),
            AnswerValue::Labels(set) => {
                let mut first = true;
                for label in set {
                    if !first {
                        write!(f, "{}", LIST_DELIMITER)?;
                    }
                    f.write_str(label)?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

/// Mapping from question id to the latest answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerStore {
    values: BTreeMap<QuestionId, AnswerValue>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: QuestionId) -> Option<&AnswerValue> {
        self.values.get(&id)
    }

    /// Overwrite one answer, returning the previous value.
    pub fn set(&mut self, id: QuestionId, value: AnswerValue) -> Option<AnswerValue> {
        self.values.insert(id, value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Answers in question-id order.
    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &AnswerValue)> {
        self.values.iter().map(|(id, value)| (*id, value))
    }

    /// Whether `question` holds an answer that counts as present for its kind.
    ///
    /// Scale: any recorded value. Text and single choice: non-empty string.
    /// Multi choice: non-empty set. Terminal questions never need one.
    pub fn has_answer(&self, question: &Question) -> bool {
        if question.kind.is_terminal() {
            return true;
        }
        self.get(question.id)
            .is_some_and(|value| value.fits(&question.kind) && value.is_present())
    }
}

impl FromIterator<(QuestionId, AnswerValue)> for AnswerStore {
    fn from_iter<T: IntoIterator<Item = (QuestionId, AnswerValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
