// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{question::CreateQuestionRequest, quiz::CreateQuizRequest},
};

/// Creates a new quiz definition.
/// Admin only.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.end_date <= payload.start_date {
        return Err(AppError::BadRequest(
            "End date must be after start date".to_string(),
        ));
    }

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO quizzes (title, description, time_limit_minutes, attempt_limit, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.time_limit_minutes)
    .bind(payload.attempt_limit)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Deletes a quiz and, via cascade, its questions and submissions.
/// Admin only.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Creates a new question for a quiz.
///
/// Enforces the data-model invariants at the only place new questions
/// enter the system: a non-empty correctness set, and for choice kinds a
/// correctness set that references existing option ids.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Err(message) = payload.check_invariants() {
        return Err(AppError::BadRequest(message));
    }

    let quiz_exists = sqlx::query_scalar::<_, i64>("SELECT id FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if quiz_exists.is_none() {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO questions (quiz_id, content, image_url, answer_type, options, correct_answers, points, position)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(quiz_id)
    .bind(&payload.content)
    .bind(&payload.image_url)
    .bind(payload.answer_type)
    .bind(SqlJson(&payload.options))
    .bind(SqlJson(&payload.correct_answers))
    .bind(payload.points)
    .bind(payload.position)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// Deletes a question.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
