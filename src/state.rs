use std::sync::Arc;

use crate::config::Config;
use crate::db::{CallbackUrlStore, SubmissionStore};
use crate::handlers::{ChainError, HandlerRegistry};
use crate::idempotency::IdempotencyResolver;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub submissions: Arc<dyn SubmissionStore>,
    pub callback_urls: Arc<dyn CallbackUrlStore>,
    pub handlers: HandlerRegistry,
}

impl AppState {
    pub fn new(
        config: Config,
        submissions: Arc<dyn SubmissionStore>,
        callback_urls: Arc<dyn CallbackUrlStore>,
    ) -> Result<Self, ChainError> {
        let resolver = IdempotencyResolver::new(config.idempotency_policy);
        let handlers = HandlerRegistry::with_defaults(submissions.clone(), resolver)?;
        Ok(Self {
            config,
            submissions,
            callback_urls,
            handlers,
        })
    }
}
