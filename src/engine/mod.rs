// src/engine/mod.rs

pub mod scoring;

use std::fmt;

use chrono::Utc;
use serde::Serialize;

use crate::models::{
    question::{AnswerType, QuizQuestion},
    quiz::QuizDefinition,
    submission::{AnswerMap, NewSubmission, SubmissionPatch},
};
use crate::store::SubmissionStore;

/// Errors the attempt engine can surface. There are deliberately only two
/// kinds: a missing identity blocks the start transition, and a storage
/// failure is reported without ever blocking the state machine.
#[derive(Debug)]
pub enum EngineError {
    NotAuthenticated,
    PersistenceFailure(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotAuthenticated => write!(f, "No authenticated user"),
            EngineError::PersistenceFailure(msg) => write!(f, "Persistence failure: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Lifecycle of one attempt. Terminal in `Finished`, no back-transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptState {
    Intro,
    Active,
    Finished,
}

/// The outcome of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    pub score: i64,
    pub max_score: i64,
}

/// What `start` hands back. `submission_id` is `None` when the create
/// write failed and the attempt runs unpersisted.
#[derive(Debug, Clone)]
pub struct StartReceipt {
    pub submission_id: Option<i64>,
    pub persistence_error: Option<String>,
}

/// One user's pass through one quiz: intro, timed active phase, scored
/// finish. Owns the in-memory session (answer map, question cursor,
/// countdown); the durable submission record lives behind the store.
///
/// Callers must serialize access (the HTTP embedding holds it behind a
/// mutex), so no method ever observes a torn state.
pub struct AttemptEngine {
    quiz: QuizDefinition,
    questions: Vec<QuizQuestion>,
    user_id: Option<i64>,
    state: AttemptState,
    current_index: usize,
    answers: AnswerMap,
    remaining_seconds: i64,
    submission_id: Option<i64>,
    /// Single-flight guard held across the create write in `start`.
    starting: bool,
    result: Option<AttemptResult>,
    finalize_error: Option<String>,
}

impl AttemptEngine {
    /// Builds an engine in the intro state. The question list is assumed
    /// immutable for the duration of the attempt.
    pub fn new(quiz: QuizDefinition, questions: Vec<QuizQuestion>) -> Self {
        Self {
            quiz,
            questions,
            user_id: None,
            state: AttemptState::Intro,
            current_index: 0,
            answers: AnswerMap::new(),
            remaining_seconds: 0,
            submission_id: None,
            starting: false,
            result: None,
            finalize_error: None,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn quiz(&self) -> &QuizDefinition {
        &self.quiz
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.remaining_seconds
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn submission_id(&self) -> Option<i64> {
        self.submission_id
    }

    pub fn result(&self) -> Option<AttemptResult> {
        self.result
    }

    /// Message of the failed finalization write, if any. The score shown
    /// to the user is valid regardless; ranking visibility is not.
    pub fn finalize_error(&self) -> Option<&str> {
        self.finalize_error.as_deref()
    }

    /// Confirms the attempt: creates the submission record in `started`
    /// status and activates the timer.
    ///
    /// Fails only when no user identity is supplied. A failed create is
    /// reported in the receipt and the attempt still activates. Repeated
    /// or concurrent calls perform no second create and return the
    /// existing receipt.
    pub async fn start(
        &mut self,
        user: Option<i64>,
        store: &dyn SubmissionStore,
    ) -> Result<StartReceipt, EngineError> {
        let user_id = user.ok_or(EngineError::NotAuthenticated)?;

        if self.starting || self.state != AttemptState::Intro {
            return Ok(StartReceipt {
                submission_id: self.submission_id,
                persistence_error: None,
            });
        }

        self.starting = true;
        self.user_id = Some(user_id);

        let new = NewSubmission {
            quiz_id: self.quiz.id,
            user_id,
            started_at: Utc::now(),
        };

        let (submission_id, persistence_error) = match store.create_submission(&new).await {
            Ok(id) => (Some(id), None),
            Err(e) => {
                tracing::warn!("Failed to create submission for quiz {}: {}", self.quiz.id, e);
                (None, Some(e.to_string()))
            }
        };

        self.submission_id = submission_id;
        self.remaining_seconds = self.quiz.time_limit_minutes * 60;
        self.state = AttemptState::Active;
        self.starting = false;

        Ok(StartReceipt {
            submission_id,
            persistence_error,
        })
    }

    /// Records an answer value for a question. Never fails; values outside
    /// the option set are accepted and simply never match at scoring time.
    ///
    /// Multi-choice toggles membership; every other kind replaces the
    /// previous value.
    pub fn record_answer(&mut self, question_id: i64, value: &str) {
        if self.state != AttemptState::Active {
            return;
        }

        let answer_type = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.answer_type);

        let entry = self.answers.entry(question_id).or_default();
        match answer_type {
            Some(AnswerType::MultiChoice) => {
                if let Some(pos) = entry.iter().position(|v| v == value) {
                    entry.remove(pos);
                } else {
                    entry.push(value.to_string());
                }
            }
            _ => {
                entry.clear();
                entry.push(value.to_string());
            }
        }
    }

    /// Moves the question cursor forward. Never validates the current
    /// answer; a no-op on the last question.
    pub fn advance(&mut self) {
        if self.state == AttemptState::Active && self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
        }
    }

    /// One second of wall-clock time. Only decrements while active;
    /// reaching zero submits with whatever has been recorded so far.
    /// Returns the result when this tick finished the attempt.
    pub async fn tick(&mut self, store: &dyn SubmissionStore) -> Option<AttemptResult> {
        if self.state != AttemptState::Active {
            return None;
        }

        self.remaining_seconds -= 1;
        if self.remaining_seconds > 0 {
            return None;
        }

        Some(self.submit(store).await)
    }

    /// Finalizes the attempt: computes the score once, transitions to
    /// `Finished`, then attempts the single finalization write.
    ///
    /// Idempotent: once finished, returns the stored result without
    /// recomputing or re-persisting. A failed write is recorded in
    /// `finalize_error` and never blocks the local result.
    pub async fn submit(&mut self, store: &dyn SubmissionStore) -> AttemptResult {
        if let Some(result) = self.result {
            return result;
        }

        let result = AttemptResult {
            score: scoring::compute_score(&self.questions, &self.answers),
            max_score: scoring::max_score(&self.questions),
        };

        if self.state != AttemptState::Active {
            // Nothing was started; report the zero result without
            // transitioning or touching storage.
            return result;
        }

        // The state flips before the write so a reentrant call can only
        // see the completed result, and the write carries the fully
        // computed score and answer map.
        self.state = AttemptState::Finished;
        self.result = Some(result);

        if let Some(id) = self.submission_id {
            let patch = SubmissionPatch {
                answers: self.answers.clone(),
                score: result.score,
                completed_at: Utc::now(),
            };
            if let Err(e) = store.update_submission(id, &patch).await {
                tracing::warn!("Failed to finalize submission {}: {}", id, e);
                self.finalize_error = Some(e.to_string());
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use sqlx::types::Json;
    use std::sync::Mutex;

    use crate::store::StoreError;

    #[derive(Default)]
    struct StoreLog {
        creates: usize,
        updates: usize,
        last_patch: Option<SubmissionPatch>,
    }

    /// In-memory store that counts calls, so tests can assert the
    /// at-most-once persistence contract.
    #[derive(Default)]
    struct MemoryStore {
        log: Mutex<StoreLog>,
        fail_create: bool,
        fail_update: bool,
    }

    impl MemoryStore {
        fn failing_create() -> Self {
            Self {
                fail_create: true,
                ..Default::default()
            }
        }

        fn failing_update() -> Self {
            Self {
                fail_update: true,
                ..Default::default()
            }
        }

        fn creates(&self) -> usize {
            self.log.lock().unwrap().creates
        }

        fn updates(&self) -> usize {
            self.log.lock().unwrap().updates
        }

        fn last_patch(&self) -> Option<SubmissionPatch> {
            self.log.lock().unwrap().last_patch.clone()
        }
    }

    #[async_trait]
    impl SubmissionStore for MemoryStore {
        async fn create_submission(&self, _new: &NewSubmission) -> Result<i64, StoreError> {
            let mut log = self.log.lock().unwrap();
            log.creates += 1;
            if self.fail_create {
                return Err(StoreError("store unavailable".to_string()));
            }
            Ok(log.creates as i64)
        }

        async fn update_submission(
            &self,
            _id: i64,
            patch: &SubmissionPatch,
        ) -> Result<(), StoreError> {
            let mut log = self.log.lock().unwrap();
            log.updates += 1;
            if self.fail_update {
                return Err(StoreError("store unavailable".to_string()));
            }
            log.last_patch = Some(patch.clone());
            Ok(())
        }
    }

    fn quiz(time_limit_minutes: i64) -> QuizDefinition {
        QuizDefinition {
            id: 1,
            title: "Sample quiz".to_string(),
            description: None,
            time_limit_minutes,
            attempt_limit: 3,
            start_date: Utc::now() - Duration::hours(1),
            end_date: Utc::now() + Duration::hours(1),
            created_at: None,
        }
    }

    fn question(
        id: i64,
        answer_type: AnswerType,
        correct: &[&str],
        points: i64,
    ) -> QuizQuestion {
        QuizQuestion {
            id,
            quiz_id: 1,
            content: format!("Question {}", id),
            image_url: None,
            answer_type,
            options: Json(vec![]),
            correct_answers: Json(correct.iter().map(|s| s.to_string()).collect()),
            points,
            position: id,
            created_at: None,
        }
    }

    fn sample_engine() -> AttemptEngine {
        AttemptEngine::new(
            quiz(10),
            vec![
                question(1, AnswerType::SingleChoice, &["optA"], 2),
                question(2, AnswerType::MultiChoice, &["optX", "optY"], 3),
            ],
        )
    }

    #[tokio::test]
    async fn start_requires_identity() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();

        let err = engine.start(None, &store).await.unwrap_err();
        assert!(matches!(err, EngineError::NotAuthenticated));
        assert_eq!(engine.state(), AttemptState::Intro);
        assert_eq!(store.creates(), 0);
    }

    #[tokio::test]
    async fn start_creates_one_started_record() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();

        let receipt = engine.start(Some(42), &store).await.unwrap();
        assert_eq!(receipt.submission_id, Some(1));
        assert!(receipt.persistence_error.is_none());
        assert_eq!(engine.state(), AttemptState::Active);
        assert_eq!(engine.remaining_seconds(), 600);
        assert_eq!(store.creates(), 1);
    }

    #[tokio::test]
    async fn repeated_start_is_single_flight() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();

        let first = engine.start(Some(42), &store).await.unwrap();
        let second = engine.start(Some(42), &store).await.unwrap();

        assert_eq!(store.creates(), 1);
        assert_eq!(first.submission_id, second.submission_id);
    }

    #[tokio::test]
    async fn sample_end_to_end_scores_five_of_five() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();

        engine.start(Some(42), &store).await.unwrap();
        engine.record_answer(1, "optA");
        engine.advance();
        engine.record_answer(2, "optX");
        engine.record_answer(2, "optY");

        let result = engine.submit(&store).await;
        assert_eq!(result.score, 5);
        assert_eq!(result.max_score, 5);
        assert_eq!(engine.state(), AttemptState::Finished);

        let patch = store.last_patch().expect("finalization write missing");
        assert_eq!(patch.score, 5);
        assert_eq!(patch.answers.get(&1).unwrap(), &vec!["optA".to_string()]);
    }

    #[tokio::test]
    async fn multi_choice_toggle_removes_and_distractor_spoils() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();
        engine.start(Some(42), &store).await.unwrap();

        // Toggle optX on, off, on again; then spoil with a distractor.
        engine.record_answer(2, "optX");
        engine.record_answer(2, "optX");
        engine.record_answer(2, "optX");
        engine.record_answer(2, "optY");
        engine.record_answer(2, "optZ");

        let result = engine.submit(&store).await;
        assert_eq!(result.score, 0);
    }

    #[tokio::test]
    async fn single_choice_replaces_prior_answer() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();
        engine.start(Some(42), &store).await.unwrap();

        engine.record_answer(1, "optB");
        engine.record_answer(1, "optA");
        assert_eq!(engine.answers().get(&1).unwrap().len(), 1);

        let result = engine.submit(&store).await;
        assert_eq!(result.score, 2);
    }

    #[tokio::test]
    async fn true_false_full_points_or_nothing() {
        let store = MemoryStore::default();
        let mut engine = AttemptEngine::new(
            quiz(5),
            vec![question(7, AnswerType::TrueFalse, &["true"], 4)],
        );
        engine.start(Some(1), &store).await.unwrap();
        engine.record_answer(7, "false");
        engine.record_answer(7, "true");

        let result = engine.submit(&store).await;
        assert_eq!(result.score, 4);
        assert_eq!(result.max_score, 4);
    }

    #[tokio::test]
    async fn submit_is_idempotent_with_one_update() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();
        engine.start(Some(42), &store).await.unwrap();
        engine.record_answer(1, "optA");

        let first = engine.submit(&store).await;
        let second = engine.submit(&store).await;

        assert_eq!(first, second);
        assert_eq!(store.updates(), 1);
    }

    #[tokio::test]
    async fn timer_expiry_auto_submits_with_empty_answers() {
        let store = MemoryStore::default();
        let mut engine = AttemptEngine::new(
            quiz(1),
            vec![
                question(1, AnswerType::SingleChoice, &["optA"], 2),
                question(2, AnswerType::TrueFalse, &["true"], 1),
            ],
        );
        engine.start(Some(42), &store).await.unwrap();

        let mut finished = None;
        for _ in 0..60 {
            finished = engine.tick(&store).await;
        }

        let result = finished.expect("60th tick must finish a 1-minute quiz");
        assert_eq!(result.score, 0);
        assert_eq!(result.max_score, 3);
        assert_eq!(engine.state(), AttemptState::Finished);
        assert_eq!(store.updates(), 1);

        // Further ticks are inert.
        assert!(engine.tick(&store).await.is_none());
        assert_eq!(store.updates(), 1);
    }

    #[tokio::test]
    async fn timer_does_not_run_before_start() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();

        assert!(engine.tick(&store).await.is_none());
        assert_eq!(engine.remaining_seconds(), 0);
        assert_eq!(engine.state(), AttemptState::Intro);
    }

    #[tokio::test]
    async fn advance_is_a_no_op_past_the_last_question() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();
        engine.start(Some(42), &store).await.unwrap();

        engine.advance();
        engine.advance();
        engine.advance();
        assert_eq!(engine.current_index(), 1);
        assert_eq!(engine.state(), AttemptState::Active);
    }

    #[tokio::test]
    async fn abandoned_attempt_never_updates() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();
        engine.start(Some(42), &store).await.unwrap();
        engine.record_answer(1, "optA");
        drop(engine);

        assert_eq!(store.creates(), 1);
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn failed_create_still_activates_and_skips_finalization() {
        let store = MemoryStore::failing_create();
        let mut engine = sample_engine();

        let receipt = engine.start(Some(42), &store).await.unwrap();
        assert!(receipt.submission_id.is_none());
        assert!(receipt.persistence_error.is_some());
        assert_eq!(engine.state(), AttemptState::Active);

        engine.record_answer(1, "optA");
        let result = engine.submit(&store).await;
        assert_eq!(result.score, 2);
        // No record was created, so nothing to finalize.
        assert_eq!(store.updates(), 0);
    }

    #[tokio::test]
    async fn failed_finalization_is_reported_but_not_fatal() {
        let store = MemoryStore::failing_update();
        let mut engine = sample_engine();
        engine.start(Some(42), &store).await.unwrap();
        engine.record_answer(1, "optA");

        let result = engine.submit(&store).await;
        assert_eq!(result.score, 2);
        assert_eq!(engine.state(), AttemptState::Finished);
        assert!(engine.finalize_error().is_some());

        // The failed write is not retried by the engine.
        engine.submit(&store).await;
        assert_eq!(store.updates(), 1);
    }

    #[tokio::test]
    async fn answers_ignore_state_outside_active() {
        let store = MemoryStore::default();
        let mut engine = sample_engine();

        engine.record_answer(1, "optA");
        assert!(engine.answers().is_empty());

        engine.start(Some(42), &store).await.unwrap();
        engine.submit(&store).await;

        engine.record_answer(1, "optA");
        assert!(engine.answers().is_empty());
    }
}
