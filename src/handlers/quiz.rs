// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{question::PublicQuestion, quiz::QuizDefinition},
    state::AppState,
    store::QuizSource,
};

/// How many entries the leaderboard endpoint returns.
const LEADERBOARD_SIZE: i64 = 10;

/// Quiz definition together with its answer-stripped questions.
#[derive(Debug, Serialize)]
pub struct QuizDetailResponse {
    #[serde(flatten)]
    pub quiz: QuizDefinition,
    pub questions: Vec<PublicQuestion>,
}

/// Lists all quizzes, newest first.
pub async fn list_quizzes(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let quizzes = state.store.quizzes().await?;
    Ok(Json(quizzes))
}

/// Returns one quiz with its ordered question list.
/// Correct answers are hidden by the `PublicQuestion` DTO.
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state
        .store
        .quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let questions = state
        .store
        .questions(quiz_id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(QuizDetailResponse { quiz, questions }))
}

/// Retrieves the top completed submissions for a quiz.
///
/// A read-only consumer of submission records; the attempt engine never
/// reads this data back.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let leaderboard = state
        .store
        .leaderboard(quiz_id, LEADERBOARD_SIZE)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch leaderboard: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(leaderboard))
}
