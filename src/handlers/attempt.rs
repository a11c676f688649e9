// src/handlers/attempt.rs

use std::{sync::Arc, time::Duration};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{
    engine::{AttemptEngine, AttemptResult, AttemptState, StartReceipt},
    error::AppError,
    models::{question::PublicQuestion, submission::AnswerMap},
    state::{ActiveAttempt, AppState},
    store::{PgStore, QuizSource},
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub question_id: i64,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct AttemptStartedResponse {
    pub submission_id: Option<i64>,
    pub total_questions: usize,
    pub remaining_seconds: i64,
    pub questions: Vec<PublicQuestion>,
    /// Set when the submission record could not be created; the attempt
    /// still runs, but it will not be visible for ranking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_warning: Option<String>,
}

impl AttemptStartedResponse {
    fn from_engine(engine: &AttemptEngine, receipt: StartReceipt) -> Self {
        Self {
            submission_id: receipt.submission_id,
            total_questions: engine.questions().len(),
            remaining_seconds: engine.remaining_seconds(),
            questions: engine
                .questions()
                .iter()
                .cloned()
                .map(PublicQuestion::from)
                .collect(),
            persistence_warning: receipt.persistence_error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttemptProgressResponse {
    pub state: AttemptState,
    pub current_index: usize,
    pub remaining_seconds: i64,
    pub answers: AnswerMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AttemptResult>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub score: i64,
    pub max_score: i64,
    /// Set when the finalization write failed. The score above is still
    /// valid locally; ranking visibility depends on a successful write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_warning: Option<String>,
}

/// Starts an attempt for the authenticated user.
///
/// Enforces the caller-side checks the engine deliberately does not own:
/// the quiz must be inside its active window, and the user must have
/// completed fewer attempts than the quiz's limit. A still-running attempt
/// for the same quiz is re-issued instead of duplicated.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quiz = state
        .store
        .quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !quiz.is_open_at(Utc::now()) {
        return Err(AppError::BadRequest("Quiz is not currently open".to_string()));
    }

    let completed = state.store.completed_attempts(quiz_id, user_id).await?;
    if completed >= quiz.attempt_limit {
        return Err(AppError::Conflict("Attempt limit reached".to_string()));
    }

    let mut attempts = state.attempts.lock().await;

    let finished_leftover = if let Some(existing) = attempts.get(&(quiz_id, user_id)) {
        let mut engine = existing.engine.lock().await;
        if engine.state() != AttemptState::Finished {
            // Re-entering a live attempt: the engine's single-flight guard
            // hands back the existing receipt, no second record is created.
            let receipt = engine.start(Some(user_id), state.store.as_ref()).await?;
            let response = AttemptStartedResponse::from_engine(&engine, receipt);
            return Ok((StatusCode::OK, Json(response)));
        }
        true
    } else {
        false
    };

    if finished_leftover {
        // Finished attempt: clear it out and begin a fresh one below.
        if let Some(old) = attempts.remove(&(quiz_id, user_id)) {
            old.ticker.abort();
        }
    }

    let questions = state.store.questions(quiz_id).await?;
    if questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    let mut engine = AttemptEngine::new(quiz, questions);
    let receipt = engine.start(Some(user_id), state.store.as_ref()).await?;
    let response = AttemptStartedResponse::from_engine(&engine, receipt);

    let engine = Arc::new(Mutex::new(engine));
    let ticker = spawn_ticker(engine.clone(), state.store.clone());
    attempts.insert((quiz_id, user_id), ActiveAttempt { engine, ticker });

    tracing::info!("User {} started an attempt on quiz {}", user_id, quiz_id);

    Ok((StatusCode::CREATED, Json(response)))
}

/// Drives the engine's countdown with one-second wall-clock ticks and
/// stops once the attempt is finished (by expiry or by user submission).
fn spawn_ticker(engine: Arc<Mutex<AttemptEngine>>, store: Arc<PgStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick of an interval fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let mut engine = engine.lock().await;
            if engine.state() == AttemptState::Finished {
                break;
            }
            if let Some(result) = engine.tick(store.as_ref()).await {
                tracing::info!(
                    "Attempt auto-submitted on timer expiry: score {}/{}",
                    result.score,
                    result.max_score
                );
                break;
            }
        }
    })
}

/// Records one answer value for the active attempt. Replaces for
/// single-choice, true/false and free-text; toggles for multi-choice.
pub async fn record_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<RecordAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = state.attempts.lock().await;
    let attempt = attempts
        .get(&(quiz_id, user_id))
        .ok_or(AppError::NotFound("No active attempt".to_string()))?;

    let mut engine = attempt.engine.lock().await;
    engine.record_answer(payload.question_id, &payload.value);

    Ok(StatusCode::NO_CONTENT)
}

/// Moves the attempt's question cursor forward.
pub async fn advance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = state.attempts.lock().await;
    let attempt = attempts
        .get(&(quiz_id, user_id))
        .ok_or(AppError::NotFound("No active attempt".to_string()))?;

    let mut engine = attempt.engine.lock().await;
    engine.advance();

    Ok(StatusCode::NO_CONTENT)
}

/// Submits the attempt and returns the computed score. Safe to call
/// again; a repeat returns the same result without another write.
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = state.attempts.lock().await;
    let attempt = attempts
        .get(&(quiz_id, user_id))
        .ok_or(AppError::NotFound("No active attempt".to_string()))?;

    let mut engine = attempt.engine.lock().await;
    let result = engine.submit(state.store.as_ref()).await;

    Ok(Json(SubmitResponse {
        score: result.score,
        max_score: result.max_score,
        persistence_warning: engine.finalize_error().map(ToOwned::to_owned),
    }))
}

/// Snapshot of the attempt for the authenticated user.
pub async fn attempt_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = state.attempts.lock().await;
    let attempt = attempts
        .get(&(quiz_id, user_id))
        .ok_or(AppError::NotFound("No active attempt".to_string()))?;

    let engine = attempt.engine.lock().await;

    Ok(Json(AttemptProgressResponse {
        state: engine.state(),
        current_index: engine.current_index(),
        remaining_seconds: engine.remaining_seconds(),
        answers: engine.answers().clone(),
        result: engine.result(),
    }))
}

/// The authenticated user's submission history for a quiz, including
/// orphaned records from abandoned attempts.
pub async fn list_my_submissions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let submissions = state.store.submissions(quiz_id, user_id).await?;
    Ok(Json(submissions))
}

/// Abandons the attempt: the ticker stops and no finalization write is
/// made, so the submission record stays in `started` status forever.
pub async fn abandon_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut attempts = state.attempts.lock().await;
    let attempt = attempts
        .remove(&(quiz_id, user_id))
        .ok_or(AppError::NotFound("No active attempt".to_string()))?;

    attempt.ticker.abort();
    tracing::info!("User {} abandoned their attempt on quiz {}", user_id, quiz_id);

    Ok(StatusCode::NO_CONTENT)
}
