//! Application state shared across handlers

use std::sync::Arc;

use crate::infrastructure::admin::AdminService;
use crate::infrastructure::auth::SessionService;
use crate::infrastructure::key::KeyService;

/// Application state holding all services
#[derive(Debug, Clone)]
pub struct AppState {
    pub key_service: Arc<KeyService>,
    pub admin_service: Arc<AdminService>,
    pub sessions: SessionService,
}

impl AppState {
    pub fn new(
        key_service: Arc<KeyService>,
        admin_service: Arc<AdminService>,
        sessions: SessionService,
    ) -> Self {
        Self {
            key_service,
            admin_service,
            sessions,
        }
    }
}
