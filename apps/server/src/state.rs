//! Shared application state.

use std::sync::Arc;

use stockbook_db::Database;

use crate::auth::JwtManager;
use crate::config::ServerConfig;

/// Handed to every handler through axum's `State` extractor.
///
/// Cheap to clone: the database is a pool handle and the rest sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_access_lifetime_secs);
        AppState {
            db,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        }
    }
}
