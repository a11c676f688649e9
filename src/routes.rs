// src/routes.rs

use axum::{
    Router, http::Method,
    middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempt, auth, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, attempts, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes))
        .route("/{id}", get(quiz::get_quiz))
        .route("/{id}/leaderboard", get(quiz::get_leaderboard))
        // Protected attempt routes: one live attempt per (quiz, user).
        .merge(
            Router::new()
                .route(
                    "/{id}/attempt",
                    post(attempt::start_attempt)
                        .get(attempt::attempt_progress)
                        .delete(attempt::abandon_attempt),
                )
                .route("/{id}/attempt/answer", post(attempt::record_answer))
                .route("/{id}/attempt/advance", post(attempt::advance))
                .route("/{id}/attempt/submit", post(attempt::submit_attempt))
                .route("/{id}/submissions", get(attempt::list_my_submissions))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let admin_routes = Router::new()
        .route("/quizzes", post(admin::create_quiz))
        .route("/quizzes/{id}", delete(admin::delete_quiz))
        .route("/quizzes/{id}/questions", post(admin::create_question))
        .route("/questions/{id}", delete(admin::delete_question))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
