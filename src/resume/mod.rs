//! Resume links: the address-bar query format in both directions.
//!
//! The page URL carries the respondent's identity plus one `q<id>`
//! parameter per answered question, so reloading or sharing the link
//! resumes at the same point. Three inbound forms are accepted:
//!
//! - address-bar form: `email=..&q1=Neutral&q4=a|b`
//! - legacy index form: `question=2&answer=3` (1-based, choice questions)
//! - field alias form for scale questions: `nps=7`
//!
//! Malformed input never reaches the user: [`PrefillRecord::from_url`]
//! logs it and falls back to the default record, keeping the identity.

use tracing::{debug, warn};
use url::Url;

use crate::answers::{AnswerStore, AnswerValue, LIST_DELIMITER};
use crate::error::{ResumeError, ResumeResult};
use crate::graph::{Question, QuestionGraph, QuestionId, QuestionKind};

/// Query parameter carrying the respondent identity.
pub const IDENTITY_PARAM: &str = "email";

/// Normalized resume input handed to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefillRecord {
    pub identity: Option<String>,
    pub answers: AnswerStore,
    /// Position in the visible sequence to start on.
    pub start_index: usize,
}

impl PrefillRecord {
    /// Parse a resume link, discarding malformed answers.
    pub fn from_url(graph: &QuestionGraph, url: &Url) -> Self {
        let identity = url
            .query_pairs()
            .find(|(key, _)| key == IDENTITY_PARAM)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let answers = match parse_answers(graph, url) {
            Ok(answers) => answers,
            Err(e) => {
                warn!(error = %e, survey = graph.name(), "Discarding malformed resume input");
                AnswerStore::new()
            }
        };

        let start_index = start_index_for(graph, &answers);
        debug!(
            survey = graph.name(),
            seeded = answers.len(),
            start_index,
            has_identity = identity.is_some(),
            "Resume link parsed"
        );

        Self {
            identity,
            answers,
            start_index,
        }
    }
}

/// Seeded answers from every supported form.
pub fn parse_answers(graph: &QuestionGraph, url: &Url) -> ResumeResult<AnswerStore> {
    let mut answers = AnswerStore::new();
    let mut legacy_question = None;
    let mut legacy_answer = None;

    for (key, raw) in url.query_pairs() {
        match key.as_ref() {
            IDENTITY_PARAM => {}
            "question" | "q" => legacy_question = Some(raw.into_owned()),
            "answer" | "a" => legacy_answer = Some(raw.into_owned()),
            key => {
                if let Some(question) = question_for_param(graph, key)? {
                    answers.set(question.id, parse_value(question, &raw)?);
                }
            }
        }
    }

    if let (Some(question), Some(answer)) = (legacy_question, legacy_answer) {
        let (id, value) = parse_legacy(graph, &question, &answer)?;
        answers.set(id, value);
    }

    Ok(answers)
}

/// Resolve a query key to a question. Unrelated keys yield `None`.
fn question_for_param<'g>(
    graph: &'g QuestionGraph,
    key: &str,
) -> ResumeResult<Option<&'g Question>> {
    if let Some(digits) = key.strip_prefix('q') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            let question = digits
                .parse::<u32>()
                .ok()
                .and_then(|id| graph.get(QuestionId(id)))
                .ok_or_else(|| ResumeError::UnknownQuestion {
                    raw: key.to_string(),
                })?;
            return Ok(Some(question));
        }
    }

    Ok(graph.questions().iter().find(|q| {
        matches!(q.kind, QuestionKind::Scale { .. }) && q.field.as_deref() == Some(key)
    }))
}

/// Parse a raw parameter into the answer shape `question` expects.
pub fn parse_value(question: &Question, raw: &str) -> ResumeResult<AnswerValue> {
    let id = question.id;
    match &question.kind {
        QuestionKind::Scale { min, max, .. } => {
            let value = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ResumeError::NotNumeric {
                    id,
                    raw: raw.to_string(),
                })?;
            if value < *min || value > *max {
                return Err(ResumeError::OutOfRange {
                    id,
                    value,
                    min: *min,
                    max: *max,
                });
            }
            Ok(AnswerValue::Number(value))
        }
        QuestionKind::SingleChoice { options } => {
            if options.iter().any(|o| o == raw) {
                Ok(AnswerValue::Label(raw.to_string()))
            } else {
                Err(ResumeError::UnknownOption {
                    id,
                    raw: raw.to_string(),
                })
            }
        }
        QuestionKind::MultiChoice { options } => raw
            .split(LIST_DELIMITER)
            .map(|label| {
                if options.iter().any(|o| o == label) {
                    Ok(label.to_string())
                } else {
                    Err(ResumeError::UnknownOption {
                        id,
                        raw: label.to_string(),
                    })
                }
            })
            .collect::<ResumeResult<_>>()
            .map(AnswerValue::Labels),
        QuestionKind::Text { .. } => Ok(AnswerValue::Text(raw.to_string())),
        QuestionKind::Terminal => Err(ResumeError::NotPrefillable { id }),
    }
}

/// `question=<n>&answer=<m>`: n-th declared question, m-th option, both 1-based.
fn parse_legacy(
    graph: &QuestionGraph,
    question: &str,
    answer: &str,
) -> ResumeResult<(QuestionId, AnswerValue)> {
    let target = question
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| graph.questions().get(index))
        .ok_or_else(|| ResumeError::UnknownQuestion {
            raw: question.to_string(),
        })?;

    let options = target
        .kind
        .options()
        .ok_or(ResumeError::NotPrefillable { id: target.id })?;

    let label = answer
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| options.get(index))
        .ok_or_else(|| ResumeError::UnknownOption {
            id: target.id,
            raw: answer.to_string(),
        })?;

    let value = match target.kind {
        QuestionKind::MultiChoice { .. } => AnswerValue::labels([label.clone()]),
        _ => AnswerValue::Label(label.clone()),
    };
    Ok((target.id, value))
}

/// First position after the last answered visible question, clamped to the
/// last non-terminal visible question.
pub fn start_index_for(graph: &QuestionGraph, answers: &AnswerStore) -> usize {
    let visible = graph.visible_questions(answers);
    let last_answered = visible
        .iter()
        .rposition(|q| !q.kind.is_terminal() && answers.has_answer(q));
    let Some(last_answered) = last_answered else {
        return 0;
    };
    let last_open = visible
        .iter()
        .rposition(|q| !q.kind.is_terminal())
        .unwrap_or(0);
    (last_answered + 1).min(last_open)
}

/// Address-bar link for the current answers.
///
/// Only present answers are written, in declaration order, each under its
/// `q<id>` parameter. Choice sets are `|`-delimited.
pub fn encode_link(
    base: &Url,
    graph: &QuestionGraph,
    identity: Option<&str>,
    answers: &AnswerStore,
) -> Url {
    let mut url = base.clone();
    url.set_query(None);

    let pairs: Vec<(String, String)> = identity
        .map(|id| (IDENTITY_PARAM.to_string(), id.to_string()))
        .into_iter()
        .chain(graph.questions().iter().filter_map(|q| {
            answers
                .get(q.id)
                .filter(|value| value.fits(&q.kind) && value.is_present())
                .map(|value| (q.param_name(), value.to_string()))
        }))
        .collect();

    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}
