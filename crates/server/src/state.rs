use std::sync::Arc;
use std::time::Duration;

use service::context::OpContext;
use service::preferences::{
    repository::memory::MemoryPreferenceRepository, DynPreferenceService, PreferenceRepository, PreferenceService,
};
use service::selections::{DynSelectionService, MemorySelectionRepository, SelectionRepository, SelectionService};
use tokio_util::sync::CancellationToken;

/// Shared handler state. Cloned per request; everything inside is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub preferences: Arc<DynPreferenceService>,
    pub selections: Arc<DynSelectionService>,
    /// Per-request store deadline; `None` disables it.
    pub request_timeout: Option<Duration>,
    /// Answer every failure with 200 and an `{"error"}` body.
    pub legacy_error_status: bool,
    /// Fired on shutdown so in-flight store calls stop.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(preferences: Arc<DynPreferenceService>, selections: Arc<DynSelectionService>) -> Self {
        Self {
            preferences,
            selections,
            request_timeout: None,
            legacy_error_status: false,
            shutdown: CancellationToken::new(),
        }
    }

    /// State backed by the in-memory repositories.
    pub fn in_memory() -> Self {
        Self::from_repos(Arc::new(MemoryPreferenceRepository::new()), Arc::new(MemorySelectionRepository::new()))
    }

    pub fn from_repos(preferences: Arc<dyn PreferenceRepository>, selections: Arc<dyn SelectionRepository>) -> Self {
        Self::new(
            Arc::new(PreferenceService::new(preferences)),
            Arc::new(SelectionService::new(selections)),
        )
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        self
    }

    pub fn with_legacy_error_status(mut self, legacy: bool) -> Self {
        self.legacy_error_status = legacy;
        self
    }

    /// Context for one request: the configured deadline plus a child of the shutdown token.
    pub fn op_context(&self) -> OpContext {
        let ctx = OpContext::new().with_cancellation(self.shutdown.child_token());
        match self.request_timeout {
            Some(t) => ctx.with_deadline(tokio::time::Instant::now() + t),
            None => ctx,
        }
    }
}
