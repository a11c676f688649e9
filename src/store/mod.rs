// src/store/mod.rs

pub mod pg;

use std::fmt;

use async_trait::async_trait;

use crate::models::{
    question::QuizQuestion,
    quiz::QuizDefinition,
    submission::{LeaderboardEntry, NewSubmission, QuizSubmission, SubmissionPatch},
};

pub use pg::PgStore;

/// Failure reported by a storage collaborator.
///
/// Carries only a message: the attempt engine treats every storage failure
/// the same way (reported, never fatal), so no finer taxonomy is needed.
#[derive(Debug)]
pub struct StoreError(pub String);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError(err.to_string())
    }
}

/// Durable record store for quiz submissions.
///
/// The attempt engine only ever issues one create per attempt and at most
/// one update per attempt; retries, if any, belong to the implementation.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Inserts a new submission in `started` status and returns its id.
    async fn create_submission(&self, new: &NewSubmission) -> Result<i64, StoreError>;

    /// Finalizes a submission: full answer map, score, completion time,
    /// `completed` status.
    async fn update_submission(&self, id: i64, patch: &SubmissionPatch) -> Result<(), StoreError>;
}

/// Read side: quiz definitions, their ordered question lists, and the
/// ranking data consumed outside the engine.
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn quizzes(&self) -> Result<Vec<QuizDefinition>, StoreError>;

    async fn quiz(&self, quiz_id: i64) -> Result<Option<QuizDefinition>, StoreError>;

    /// Questions of a quiz in presentation order.
    async fn questions(&self, quiz_id: i64) -> Result<Vec<QuizQuestion>, StoreError>;

    /// Number of completed submissions a user already has for a quiz.
    /// Used by callers for attempt-limit checks before starting the engine.
    async fn completed_attempts(&self, quiz_id: i64, user_id: i64) -> Result<i64, StoreError>;

    /// A user's own submissions for a quiz, newest first. Includes
    /// orphaned `started` records from abandoned attempts.
    async fn submissions(
        &self,
        quiz_id: i64,
        user_id: i64,
    ) -> Result<Vec<QuizSubmission>, StoreError>;

    async fn leaderboard(&self, quiz_id: i64, limit: i64)
    -> Result<Vec<LeaderboardEntry>, StoreError>;
}
