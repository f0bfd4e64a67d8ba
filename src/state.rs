use std::sync::Arc;

use crate::{auth::TokenKeys, config::Config, db::Store, mail::Mailer};

/// Process-wide dependencies, built once at startup and cloned into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub keys: Arc<TokenKeys>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        let keys = Arc::new(TokenKeys::new(config.jwt_secret.as_bytes()));
        Self {
            config: Arc::new(config),
            store,
            mailer,
            keys,
        }
    }
}
