// src/models/quiz.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Represents the 'quizzes' table in the database.
/// Immutable for the duration of an attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizDefinition {
    pub id: i64,

    pub title: String,

    pub description: Option<String>,

    /// Countdown budget for one attempt, in minutes.
    pub time_limit_minutes: i64,

    /// Maximum number of completed attempts per user.
    pub attempt_limit: i64,

    /// Active window. Attempts may only be started inside it.
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,

    pub created_at: Option<DateTime<Utc>>,
}

impl QuizDefinition {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200, message = "Title length must be between 1 and 200 characters."))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "Time limit must be between 1 minute and 24 hours."))]
    pub time_limit_minutes: i64,
    #[validate(range(min = 1))]
    pub attempt_limit: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}
