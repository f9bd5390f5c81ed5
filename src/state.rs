use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    storage::ObjectStorage,
};

pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Everything a gate-pass handler touches: the connection pool, the resolved
/// configuration, the object store holding ID proofs and rendered permits,
/// and the token service guarding the admin surface.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        storage: Arc<dyn ObjectStorage>,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            storage,
            jwt,
        }
    }

    /// Checks a connection out of the pool. Exhaustion or a dead database
    /// surfaces as a 500 so request handlers can stay on `?`.
    pub fn db(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("no database connection available: {err}")))
    }
}
