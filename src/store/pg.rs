// src/store/pg.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use super::{QuizSource, StoreError, SubmissionStore};
use crate::models::{
    question::QuizQuestion,
    quiz::QuizDefinition,
    submission::{LeaderboardEntry, NewSubmission, QuizSubmission, SubmissionPatch},
};

/// PostgreSQL-backed implementation of both store traits.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn create_submission(&self, new: &NewSubmission) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO submissions (quiz_id, user_id, started_at, status)
            VALUES ($1, $2, $3, 'started')
            RETURNING id
            "#,
        )
        .bind(new.quiz_id)
        .bind(new.user_id)
        .bind(new.started_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update_submission(&self, id: i64, patch: &SubmissionPatch) -> Result<(), StoreError> {
        // The status guard makes the write a no-op for anything but the
        // single started -> completed transition.
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET answers = $1, score = $2, completed_at = $3, status = 'completed'
            WHERE id = $4 AND status = 'started'
            "#,
        )
        .bind(Json(&patch.answers))
        .bind(patch.score)
        .bind(patch.completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError(format!(
                "submission {} not found or already completed",
                id
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl QuizSource for PgStore {
    async fn quizzes(&self) -> Result<Vec<QuizDefinition>, StoreError> {
        let quizzes = sqlx::query_as::<_, QuizDefinition>(
            "SELECT * FROM quizzes ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(quizzes)
    }

    async fn quiz(&self, quiz_id: i64) -> Result<Option<QuizDefinition>, StoreError> {
        let quiz = sqlx::query_as::<_, QuizDefinition>("SELECT * FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(quiz)
    }

    async fn questions(&self, quiz_id: i64) -> Result<Vec<QuizQuestion>, StoreError> {
        let questions = sqlx::query_as::<_, QuizQuestion>(
            r#"
            SELECT id, quiz_id, content, image_url, answer_type,
                   options, correct_answers, points, position, created_at
            FROM questions
            WHERE quiz_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn completed_attempts(&self, quiz_id: i64, user_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM submissions
            WHERE quiz_id = $1 AND user_id = $2 AND status = 'completed'
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn submissions(
        &self,
        quiz_id: i64,
        user_id: i64,
    ) -> Result<Vec<QuizSubmission>, StoreError> {
        let submissions = sqlx::query_as::<_, QuizSubmission>(
            r#"
            SELECT id, quiz_id, user_id, answers, score, started_at, completed_at, status
            FROM submissions
            WHERE quiz_id = $1 AND user_id = $2
            ORDER BY started_at DESC
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(submissions)
    }

    async fn leaderboard(
        &self,
        quiz_id: i64,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT u.username, s.score, s.completed_at
            FROM submissions s
            JOIN users u ON s.user_id = u.id
            WHERE s.quiz_id = $1 AND s.status = 'completed'
            ORDER BY s.score DESC, s.completed_at ASC
            LIMIT $2
            "#,
        )
        .bind(quiz_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
