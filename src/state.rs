use std::{collections::HashMap, sync::Arc};

use axum::extract::FromRef;
use sqlx::PgPool;
use tokio::{sync::Mutex, task::JoinHandle};

use crate::{config::Config, engine::AttemptEngine, store::PgStore};

/// One live attempt: the engine plus the ticker task driving its countdown.
pub struct ActiveAttempt {
    pub engine: Arc<Mutex<AttemptEngine>>,
    pub ticker: JoinHandle<()>,
}

/// (quiz_id, user_id). One live attempt per user per quiz.
pub type AttemptKey = (i64, i64);

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub store: Arc<PgStore>,
    pub attempts: Arc<Mutex<HashMap<AttemptKey, ActiveAttempt>>>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            store: Arc::new(PgStore::new(pool.clone())),
            pool,
            config,
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
