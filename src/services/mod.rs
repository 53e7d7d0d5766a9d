//! The core flows: scan resolution, access requests, borrow redemption and
//! secure viewing, each running against an [`AppContext`].

pub mod access_requests;
pub mod auth;
pub mod borrow_engine;
pub mod notifications;
pub mod scan_resolver;
pub mod viewer;

use std::sync::Arc;

use crate::core::{FlowSettings, SideEffects};
use crate::gateway::Gateway;
use viewer::DocumentFetcher;

/// Everything a flow needs: the backend, the file-fetch collaborator, the
/// best-effort queue and the tunables.
#[derive(Clone)]
pub struct AppContext {
    pub gateway: Arc<dyn Gateway>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub side_effects: SideEffects,
    pub settings: Arc<FlowSettings>,
}

impl AppContext {
    /// Must be called from within a tokio runtime: starts the side-effect worker.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        fetcher: Arc<dyn DocumentFetcher>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            gateway,
            fetcher,
            side_effects: SideEffects::start(),
            settings: Arc::new(settings),
        }
    }
}
