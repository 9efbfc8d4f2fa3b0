//! Resume link tests
//!
//! Covers the address-bar format in both directions and the inbound
//! normalisation rules.

use pretty_assertions::assert_eq;
use url::Url;

use survey_flow::answers::{AnswerStore, AnswerValue};
use survey_flow::graph::{nps_graph, subscription_graph, Question, QuestionGraph, QuestionId};
use survey_flow::resume::{encode_link, parse_answers, PrefillRecord};

fn page(query: &str) -> Url {
    Url::parse(&format!("https://survey.test/page?{}", query)).unwrap()
}

fn mixed_graph() -> QuestionGraph {
    QuestionGraph::new(
        "mixed",
        vec![
            Question::scale(1, "Score?", 1, 5),
            Question::single_choice(2, "Plan?", ["Basic", "Pro & Team"]),
            Question::multi_choice(3, "Features?", ["Export", "Sync", "Share"]),
            Question::text(4, "Anything else?"),
            Question::terminal(5, "Thanks", "Bye"),
        ],
        None,
    )
    .unwrap()
}

#[test]
fn test_link_round_trip_reconstructs_answers() {
    let graph = mixed_graph();
    let mut answers = AnswerStore::new();
    answers.set(QuestionId(1), AnswerValue::Number(4));
    answers.set(QuestionId(2), AnswerValue::Label("Pro & Team".to_string()));
    answers.set(QuestionId(3), AnswerValue::labels(["Sync", "Export"]));
    answers.set(QuestionId(4), AnswerValue::Text("fast = good, 100%?".to_string()));

    let base = Url::parse("https://survey.test/mixed").unwrap();
    let link = encode_link(&base, &graph, Some("r@x.io"), &answers);
    let parsed = parse_answers(&graph, &link).unwrap();
    assert_eq!(parsed, answers);

    let record = PrefillRecord::from_url(&graph, &link);
    assert_eq!(record.identity.as_deref(), Some("r@x.io"));
    assert_eq!(record.answers, answers);
    // Every askable question answered: resume on the last one
    assert_eq!(record.start_index, 3);
}

#[test]
fn test_list_answers_use_pipe_delimiter() {
    let graph = mixed_graph();
    let mut answers = AnswerStore::new();
    answers.set(QuestionId(3), AnswerValue::labels(["Share", "Export"]));

    let base = Url::parse("https://survey.test/mixed").unwrap();
    let link = encode_link(&base, &graph, None, &answers);
    assert_eq!(link.query(), Some("q3=Export%7CShare"));
}

#[test]
fn test_resume_scenario_starts_after_seeded_question() {
    let graph = subscription_graph().unwrap();
    let record = PrefillRecord::from_url(&graph, &page("q1=Neutral"));

    assert_eq!(
        record.answers.get(QuestionId(1)),
        Some(&AnswerValue::Label("Neutral".to_string()))
    );
    assert_eq!(record.start_index, 1);
    assert_eq!(record.identity, None);
}

#[test]
fn test_malformed_values_are_discarded() {
    let graph = mixed_graph();
    for query in [
        "q1=0",
        "q1=6",
        "q1=3.5",
        "q2=Enterprise",
        "q3=Export|Print",
        "q5=x",
        "q42=1",
    ] {
        let record = PrefillRecord::from_url(&graph, &page(&format!("email=e%40x.io&q4=hi&{}", query)));
        assert!(record.answers.is_empty(), "{}", query);
        assert_eq!(record.start_index, 0, "{}", query);
        assert_eq!(record.identity.as_deref(), Some("e@x.io"), "{}", query);
    }
}

#[test]
fn test_blank_identity_is_ignored() {
    let graph = nps_graph().unwrap();
    let record = PrefillRecord::from_url(&graph, &page("email=%20&nps=9"));
    assert_eq!(record.identity, None);
    assert_eq!(record.answers.get(QuestionId(1)), Some(&AnswerValue::Number(9)));
}

#[test]
fn test_hidden_answers_do_not_move_start() {
    let graph = nps_graph().unwrap();
    // Q2 is hidden for a promoter score, so only Q1 counts
    let record = PrefillRecord::from_url(&graph, &page("q1=9&q2=meh"));
    assert_eq!(record.answers.len(), 2);
    assert_eq!(record.start_index, 1);
}
