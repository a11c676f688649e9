// src/engine/scoring.rs

use crate::models::{
    question::{AnswerType, QuizQuestion},
    submission::AnswerMap,
};

/// Whether a recorded answer set satisfies a question's correctness set.
///
/// Multi-choice requires exact set equality (both sides sorted, compared
/// element-wise); no partial credit. Every other kind requires exactly one
/// recorded value that is a member of the correctness set. An empty
/// correctness set never matches, so a hand-edited row cannot make an
/// unanswered question score.
pub fn is_correct(question: &QuizQuestion, recorded: &[String]) -> bool {
    let correct = &question.correct_answers.0;
    if correct.is_empty() {
        return false;
    }

    match question.answer_type {
        AnswerType::MultiChoice => {
            if recorded.len() != correct.len() {
                return false;
            }
            let mut recorded = recorded.to_vec();
            let mut correct = correct.clone();
            recorded.sort();
            correct.sort();
            recorded == correct
        }
        AnswerType::SingleChoice | AnswerType::TrueFalse | AnswerType::FreeText => {
            recorded.len() == 1 && correct.contains(&recorded[0])
        }
    }
}

/// Sum of all question points, the upper bound of any score.
pub fn max_score(questions: &[QuizQuestion]) -> i64 {
    questions.iter().map(|q| q.points).sum()
}

/// Final score over the full question list. Unanswered questions
/// contribute an empty answer set and therefore nothing.
pub fn compute_score(questions: &[QuizQuestion], answers: &AnswerMap) -> i64 {
    questions
        .iter()
        .filter(|q| {
            let recorded = answers.get(&q.id).map(Vec::as_slice).unwrap_or(&[]);
            is_correct(q, recorded)
        })
        .map(|q| q.points)
        .sum()
}
