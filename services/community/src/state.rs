//! Application state shared across handlers

use std::sync::Arc;

use crate::actions::Services;
use crate::session::SessionVerifier;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub sessions: Arc<SessionVerifier>,
}

impl AppState {
    pub fn new(services: Services, sessions: SessionVerifier) -> Self {
        Self {
            services,
            sessions: Arc::new(sessions),
        }
    }
}
