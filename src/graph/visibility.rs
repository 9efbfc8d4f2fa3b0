//! Declarative visibility predicates.

use serde::{Deserialize, Serialize};

use super::QuestionId;
use crate::answers::{AnswerStore, AnswerValue};

/// What a predicate reads its operand from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// The recorded answer of another (or the same) question.
    Answer(QuestionId),
    /// The graph's designated score question.
    Score,
}

/// Comparison applied to the subject's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operator {
    /// Inclusive on both bounds.
    Between { min: i64, max: i64 },
    /// `>=`
    AtLeast { value: i64 },
    /// `<=`
    AtMost { value: i64 },
    /// Exact string match against any of the operands.
    EqualsOneOf { values: Vec<String> },
}

impl Operator {
    /// Evaluate the operator against a recorded answer.
    ///
    /// Numeric operators only match numeric answers. `EqualsOneOf` compares
    /// the answer's string form; a choice set matches when any selected
    /// label is listed.
    pub fn evaluate(&self, answer: &AnswerValue) -> bool {
        match self {
            Operator::Between { min, max } => answer
                .as_number()
                .is_some_and(|n| n >= *min && n <= *max),
            Operator::AtLeast { value } => answer.as_number().is_some_and(|n| n >= *value),
            Operator::AtMost { value } => answer.as_number().is_some_and(|n| n <= *value),
            Operator::EqualsOneOf { values } => match answer {
                AnswerValue::Labels(set) => set.iter().any(|l| values.iter().any(|v| v == l)),
                other => {
                    let text = other.to_string();
                    values.iter().any(|v| *v == text)
                }
            },
        }
    }
}

/// Visibility gate `{dependsOn, operator, operands}` attached to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub subject: Subject,
    #[serde(flatten)]
    pub operator: Operator,
}

impl Visibility {
    /// Gate on another question's answer.
    pub fn on(depends_on: QuestionId, operator: Operator) -> Self {
        Self {
            subject: Subject::Answer(depends_on),
            operator,
        }
    }

    /// Gate on the graph's score question.
    pub fn on_score(operator: Operator) -> Self {
        Self {
            subject: Subject::Score,
            operator,
        }
    }

    /// Gate satisfied when the score lies in `min..=max`.
    pub fn score_between(min: i64, max: i64) -> Self {
        Self::on_score(Operator::Between { min, max })
    }

    /// Gate satisfied when `depends_on` was answered with one of `values`.
    pub fn equals_one_of<I, S>(depends_on: QuestionId, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::on(
            depends_on,
            Operator::EqualsOneOf {
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// The question this gate reads, resolving `Score` through `score_question`.
    pub fn dependency(&self, score_question: Option<QuestionId>) -> Option<QuestionId> {
        match self.subject {
            Subject::Answer(id) => Some(id),
            Subject::Score => score_question,
        }
    }

    /// Evaluate against the latest answers. An unanswered subject is `false`.
    pub fn evaluate(&self, answers: &AnswerStore, score_question: Option<QuestionId>) -> bool {
        self.dependency(score_question)
            .and_then(|id| answers.get(id))
            .is_some_and(|answer| self.operator.evaluate(answer))
    }
}
