//! Manualdesk server - multi-tenant operations manuals with access control
//! and work sessions

pub mod access;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod store;

use std::sync::Arc;

use crate::access::AccessResolver;
use crate::session::{ArtifactGuard, SessionManager};
use crate::store::Store;

/// Application state shared across handlers
pub struct AppState {
    pub store: Store,
    pub resolver: AccessResolver<Store, Store>,
    pub sessions: SessionManager,
    pub artifacts: ArtifactGuard,
}

impl AppState {
    pub fn from_store(store: Store) -> Arc<Self> {
        let resolver = AccessResolver::new(store.clone(), store.clone());
        let sessions = SessionManager::new(store.clone(), resolver.clone());
        let artifacts = ArtifactGuard::new(sessions.clone(), store.clone());

        Arc::new(Self {
            store,
            resolver,
            sessions,
            artifacts,
        })
    }
}
