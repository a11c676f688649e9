// src/models/submission.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// Recorded answers, keyed by question id. Each entry is the set of
/// submitted answer values for that question.
pub type AnswerMap = HashMap<i64, Vec<String>>;

/// Lifecycle tag of a submission record. Stored as the Postgres enum
/// 'submission_status'. Transitions `started -> completed` exactly once;
/// abandoned attempts stay `started` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "submission_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Started,
    Completed,
}

/// Represents the 'submissions' table in the database.
/// The durable artifact of one attempt, visible to ranking consumers.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub answers: Json<AnswerMap>,
    pub score: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SubmissionStatus,
}

/// Values for the insert performed the moment an attempt begins.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub quiz_id: i64,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
}

/// Finalization patch, written at most once per attempt.
#[derive(Debug, Clone)]
pub struct SubmissionPatch {
    pub answers: AnswerMap,
    pub score: i64,
    pub completed_at: DateTime<Utc>,
}

/// Aggregated struct for displaying the leaderboard.
/// Represents a row joined from `users` and `submissions`.
#[derive(Debug, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub score: i64,
    pub completed_at: Option<DateTime<Utc>>,
}
