use std::time::Instant;

use sqlx::PgPool;

use blogqa_core::Config;

use crate::metrics::Metrics;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub metrics: Metrics,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            pool,
            config,
            metrics: Metrics::new(),
            started_at: Instant::now(),
        }
    }
}
