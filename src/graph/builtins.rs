//! Built-in survey graphs.

use super::{Operator, Question, QuestionGraph, QuestionId, Visibility};
use crate::error::GraphResult;

/// Names accepted by [`builtin`].
pub const BUILTIN_SURVEYS: &[&str] = &["nps", "subscription"];

/// Look up a built-in graph by name.
pub fn builtin(name: &str) -> Option<GraphResult<QuestionGraph>> {
    match name {
        "nps" => Some(nps_graph()),
        "subscription" => Some(subscription_graph()),
        _ => None,
    }
}

/// Net promoter survey.
///
/// Questions:
/// 1. Score 0-10 (payload field `nps`, the graph's score question)
/// 2. Follow-up for detractors (0-6)
/// 3. Follow-up for passives (7-8)
/// 4. Follow-up for promoters (9+)
/// 5. Closing screen
///
/// The three follow-ups share the payload field `response`; exactly one is
/// visible once a score exists.
pub fn nps_graph() -> GraphResult<QuestionGraph> {
    QuestionGraph::new(
        "nps",
        vec![
            Question::scale(
                1,
                "How likely are you to recommend PrettyBoy to a friend?",
                0,
                10,
            )
            .with_scale_labels("Not likely", "Extremely likely")
            .with_field("nps"),
            Question::text(2, "We're sorry to hear that. What could we do better?")
                .with_subtitle("Your honest feedback goes straight to our team.")
                .with_placeholder("Type your answer here...")
                .with_visibility(Visibility::score_between(0, 6))
                .with_field("response"),
            Question::text(3, "What would make PrettyBoy a 10 for you?")
                .with_placeholder("Type your answer here...")
                .with_visibility(Visibility::score_between(7, 8))
                .with_field("response"),
            Question::text(4, "Amazing! What do you love most about PrettyBoy?")
                .with_placeholder("Type your answer here...")
                .with_visibility(Visibility::on_score(Operator::AtLeast { value: 9 }))
                .with_field("response"),
            Question::terminal(
                5,
                "Thank you for your feedback!",
                "Your responses help us make PrettyBoy even better.",
            ),
        ],
        Some(QuestionId(1)),
    )
}

/// Subscription retention survey.
///
/// The reason question only appears for respondents unsure about or
/// unlikely to continue.
pub fn subscription_graph() -> GraphResult<QuestionGraph> {
    QuestionGraph::new(
        "subscription",
        vec![
            Question::single_choice(
                1,
                "How satisfied are you with PrettyBoy so far?",
                [
                    "Very satisfied",
                    "Satisfied",
                    "Neutral",
                    "Dissatisfied",
                    "Very dissatisfied",
                ],
            ),
            Question::single_choice(
                2,
                "How likely are you to continue your subscription?",
                ["Very likely", "Likely", "Unsure", "Unlikely", "Very unlikely"],
            ),
            Question::single_choice(
                3,
                "What's the main reason you're not likely to continue?",
                [
                    "Price feels too high",
                    "Not seeing results yet",
                    "I don't use it enough",
                    "Prefer to buy when I need it",
                ],
            )
            .with_visibility(Visibility::equals_one_of(
                QuestionId(2),
                ["Unsure", "Unlikely", "Very unlikely"],
            )),
            Question::terminal(
                4,
                "Thank you for your feedback!",
                "Your responses help us make PrettyBoy even better.",
            ),
        ],
        None,
    )
}
