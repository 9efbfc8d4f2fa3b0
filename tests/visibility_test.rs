//! Visibility evaluator tests
//!
//! Exercises the visible sequence against branching graphs, including the
//! built-in surveys.

use pretty_assertions::assert_eq;

use survey_flow::answers::{AnswerStore, AnswerValue};
use survey_flow::flow::{Progress, StepCursor};
use survey_flow::graph::{
    builtin, nps_graph, subscription_graph, Operator, Question, QuestionGraph, QuestionId,
    Visibility, BUILTIN_SURVEYS,
};

fn ids(graph: &QuestionGraph, answers: &AnswerStore) -> Vec<u32> {
    graph
        .visible_questions(answers)
        .iter()
        .map(|q| q.id.0)
        .collect()
}

fn answers(pairs: &[(u32, AnswerValue)]) -> AnswerStore {
    pairs
        .iter()
        .cloned()
        .map(|(id, value)| (QuestionId(id), value))
        .collect()
}

fn label(s: &str) -> AnswerValue {
    AnswerValue::Label(s.to_string())
}

#[test]
fn test_scale_gated_text_question() {
    let graph = QuestionGraph::new(
        "scenario",
        vec![
            Question::scale(1, "Score?", 0, 10),
            Question::text(2, "Why?")
                .with_visibility(Visibility::on(QuestionId(1), Operator::Between { min: 0, max: 6 })),
            Question::terminal(3, "Thanks", "Done"),
        ],
        None,
    )
    .unwrap();

    assert_eq!(ids(&graph, &answers(&[(1, AnswerValue::Number(8))])), vec![1, 3]);
    assert_eq!(ids(&graph, &answers(&[(1, AnswerValue::Number(3))])), vec![1, 2, 3]);
}

#[test]
fn test_equals_one_of_gate() {
    let graph = subscription_graph().unwrap();

    assert_eq!(ids(&graph, &AnswerStore::new()), vec![1, 2, 4]);
    assert_eq!(ids(&graph, &answers(&[(2, label("Unlikely"))])), vec![1, 2, 3, 4]);
    assert_eq!(ids(&graph, &answers(&[(2, label("Very unlikely"))])), vec![1, 2, 3, 4]);
    assert_eq!(ids(&graph, &answers(&[(2, label("Likely"))])), vec![1, 2, 4]);
    assert_eq!(ids(&graph, &answers(&[(2, label("unlikely"))])), vec![1, 2, 4]);
    assert_eq!(ids(&graph, &answers(&[(2, label(""))])), vec![1, 2, 4]);
    assert_eq!(ids(&graph, &answers(&[(2, AnswerValue::Number(3))])), vec![1, 2, 4]);
}

#[test]
fn test_nps_score_bands() {
    let graph = nps_graph().unwrap();
    let score = |n: i64| answers(&[(1, AnswerValue::Number(n))]);

    assert_eq!(ids(&graph, &AnswerStore::new()), vec![1, 5]);
    assert_eq!(ids(&graph, &score(0)), vec![1, 2, 5]);
    assert_eq!(ids(&graph, &score(6)), vec![1, 2, 5]);
    assert_eq!(ids(&graph, &score(7)), vec![1, 3, 5]);
    assert_eq!(ids(&graph, &score(8)), vec![1, 3, 5]);
    assert_eq!(ids(&graph, &score(9)), vec![1, 4, 5]);
    assert_eq!(ids(&graph, &score(10)), vec![1, 4, 5]);
}

#[test]
fn test_declaration_order_is_preserved() {
    let graph = QuestionGraph::new(
        "order",
        vec![
            Question::single_choice(1, "Pick", ["a", "b"]),
            Question::text(2, "If b").with_visibility(Visibility::equals_one_of(QuestionId(1), ["b"])),
            Question::text(3, "Always"),
            Question::text(4, "If a").with_visibility(Visibility::equals_one_of(QuestionId(1), ["a"])),
        ],
        None,
    )
    .unwrap();

    assert_eq!(ids(&graph, &answers(&[(1, label("a"))])), vec![1, 3, 4]);
    assert_eq!(ids(&graph, &answers(&[(1, label("b"))])), vec![1, 2, 3]);
}

#[test]
fn test_multi_choice_gate_matches_any_label() {
    let graph = QuestionGraph::new(
        "multi",
        vec![
            Question::multi_choice(1, "Which?", ["x", "y", "z"]),
            Question::text(2, "About z").with_visibility(Visibility::equals_one_of(QuestionId(1), ["z"])),
        ],
        None,
    )
    .unwrap();

    assert_eq!(ids(&graph, &answers(&[(1, AnswerValue::labels(["x", "z"]))])), vec![1, 2]);
    assert_eq!(ids(&graph, &answers(&[(1, AnswerValue::labels(["x"]))])), vec![1]);
}

#[test]
fn test_removing_conditional_question_shrinks_progress() {
    let graph = subscription_graph().unwrap();
    let cursor = StepCursor::at(1);

    let with_reason = answers(&[(1, label("Neutral")), (2, label("Unsure"))]);
    let visible = graph.visible_questions(&with_reason);
    let before = Progress::compute(&visible, &cursor);

    let without_reason = answers(&[(1, label("Neutral")), (2, label("Likely"))]);
    let visible = graph.visible_questions(&without_reason);
    let after = Progress::compute(&visible, &cursor);

    assert_eq!((before.step, before.total), (2, 3));
    assert_eq!((after.step, after.total), (2, 2));
    assert!(after.total < before.total);
    assert!(after.percent() <= 100.0);
}

#[test]
fn test_builtins_are_valid() {
    for name in BUILTIN_SURVEYS {
        let graph = builtin(name).unwrap().unwrap();
        assert_eq!(graph.name(), *name);
    }
    assert!(builtin("missing").is_none());
}
