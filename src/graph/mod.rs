//! Question graph and visibility evaluation.
//!
//! A graph is a flat, ordered declaration of questions. Branching is
//! expressed purely as data: each question may carry a [`Visibility`]
//! gate, and [`QuestionGraph::visible_questions`] filters the declaration
//! order against the current answers.

mod builtins;
mod visibility;

pub use builtins::*;
pub use visibility::*;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::answers::{AnswerStore, LIST_DELIMITER};
use crate::error::{GraphError, GraphResult};

/// Stable question identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub u32);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a question and its kind-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QuestionKind {
    /// Integer scale, both bounds inclusive.
    Scale {
        min: i64,
        max: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_label: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_label: Option<String>,
    },
    /// Pick exactly one label.
    SingleChoice { options: Vec<String> },
    /// Pick any number of labels.
    MultiChoice { options: Vec<String> },
    /// Free text.
    Text {
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    /// Closing screen content.
    Terminal,
}

impl QuestionKind {
    /// Short kind name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Scale { .. } => "scale",
            QuestionKind::SingleChoice { .. } => "singleChoice",
            QuestionKind::MultiChoice { .. } => "multiChoice",
            QuestionKind::Text { .. } => "text",
            QuestionKind::Terminal => "terminal",
        }
    }

    /// Choice labels, if this is a choice kind.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options } => {
                Some(options)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuestionKind::Terminal)
    }
}

/// A single question declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// Prompt text; the heading for terminal questions.
    pub prompt: String,
    /// Secondary text; the body for terminal questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    /// Snapshot payload field; defaults to `q<id>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Question {
    /// Create an always-visible question.
    pub fn new(id: u32, prompt: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: QuestionId(id),
            prompt: prompt.into(),
            subtitle: None,
            kind,
            visibility: None,
            field: None,
        }
    }

    /// Scale question without end labels.
    pub fn scale(id: u32, prompt: impl Into<String>, min: i64, max: i64) -> Self {
        Self::new(
            id,
            prompt,
            QuestionKind::Scale {
                min,
                max,
                min_label: None,
                max_label: None,
            },
        )
    }

    pub fn single_choice<I, S>(id: u32, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            prompt,
            QuestionKind::SingleChoice {
                options: options.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn multi_choice<I, S>(id: u32, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            id,
            prompt,
            QuestionKind::MultiChoice {
                options: options.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn text(id: u32, prompt: impl Into<String>) -> Self {
        Self::new(id, prompt, QuestionKind::Text { placeholder: None })
    }

    /// Terminal question with a heading and body.
    pub fn terminal(id: u32, heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(id, heading, QuestionKind::Terminal).with_subtitle(body)
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set scale end labels. No effect on other kinds.
    pub fn with_scale_labels(mut self, low: impl Into<String>, high: impl Into<String>) -> Self {
        if let QuestionKind::Scale {
            min_label,
            max_label,
            ..
        } = &mut self.kind
        {
            *min_label = Some(low.into());
            *max_label = Some(high.into());
        }
        self
    }

    /// Set the text placeholder. No effect on other kinds.
    pub fn with_placeholder(mut self, text: impl Into<String>) -> Self {
        if let QuestionKind::Text { placeholder } = &mut self.kind {
            *placeholder = Some(text.into());
        }
        self
    }

    /// Snapshot payload field name.
    pub fn field_name(&self) -> String {
        self.field
            .clone()
            .unwrap_or_else(|| format!("q{}", self.id))
    }

    /// Address-bar parameter name.
    pub fn param_name(&self) -> String {
        format!("q{}", self.id)
    }
}

/// Ordered, validated question declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionGraph {
    name: String,
    questions: Vec<Question>,
    score_question: Option<QuestionId>,
}

impl QuestionGraph {
    /// Build and validate a graph.
    ///
    /// Every gate must reference a question declared at or before the gated
    /// question, so dependency cycles cannot be expressed. A question gated
    /// on itself is allowed.
    pub fn new(
        name: impl Into<String>,
        questions: Vec<Question>,
        score_question: Option<QuestionId>,
    ) -> GraphResult<Self> {
        let name = name.into();
        if questions.is_empty() {
            return Err(GraphError::Empty { name });
        }

        let mut seen = HashSet::new();
        for question in &questions {
            if question.id.0 == 0 {
                return Err(GraphError::InvalidId);
            }
            if !seen.insert(question.id) {
                return Err(GraphError::DuplicateId { id: question.id });
            }
            match &question.kind {
                QuestionKind::Scale { min, max, .. } if min > max => {
                    return Err(GraphError::InvalidScale {
                        id: question.id,
                        min: *min,
                        max: *max,
                    });
                }
                QuestionKind::SingleChoice { options } | QuestionKind::MultiChoice { options }
                    if options.is_empty() =>
                {
                    return Err(GraphError::NoOptions { id: question.id });
                }
                // Multi-choice answers are joined with the delimiter in links
                QuestionKind::MultiChoice { options } => {
                    if let Some(option) = options.iter().find(|o| o.contains(LIST_DELIMITER)) {
                        return Err(GraphError::DelimiterInOption {
                            id: question.id,
                            option: option.clone(),
                        });
                    }
                }
                _ => {}
            }
        }

        if let Some(score) = score_question {
            match questions.iter().find(|q| q.id == score) {
                Some(q) if matches!(q.kind, QuestionKind::Scale { .. }) => {}
                Some(_) => return Err(GraphError::ScoreNotScale { id: score }),
                None => {
                    return Err(GraphError::UnknownDependency {
                        id: score,
                        depends_on: score,
                    })
                }
            }
        }

        for (position, question) in questions.iter().enumerate() {
            let Some(gate) = &question.visibility else {
                continue;
            };
            let depends_on = match gate.dependency(score_question) {
                Some(id) => id,
                None => return Err(GraphError::MissingScoreQuestion { id: question.id }),
            };
            match questions.iter().position(|q| q.id == depends_on) {
                None => {
                    return Err(GraphError::UnknownDependency {
                        id: question.id,
                        depends_on,
                    })
                }
                Some(dep_position) if dep_position > position => {
                    return Err(GraphError::ForwardDependency {
                        id: question.id,
                        depends_on,
                    })
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            name,
            questions,
            score_question,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All questions in declaration order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn score_question(&self) -> Option<QuestionId> {
        self.score_question
    }

    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Declaration position of a question.
    pub fn position(&self, id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|q| q.id == id)
    }

    /// Whether a single question's gate passes against `answers`.
    pub fn is_visible(&self, question: &Question, answers: &AnswerStore) -> bool {
        question
            .visibility
            .as_ref()
            .map_or(true, |gate| gate.evaluate(answers, self.score_question))
    }

    /// Currently visible questions, in declaration order.
    pub fn visible_questions(&self, answers: &AnswerStore) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| self.is_visible(q, answers))
            .collect()
    }
}
