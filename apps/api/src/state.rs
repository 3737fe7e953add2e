use std::sync::Arc;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::contracts::analyzer::AnalysisEngine;
use crate::contracts::cache::ContractCache;
use crate::contracts::detector::TypeDetector;
use crate::contracts::files::FileStore;
use crate::contracts::store::ContractRepository;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external collaborator sits behind a trait object so the pipeline can
/// be exercised against in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    pub contracts: Arc<dyn ContractRepository>,
    pub files: Arc<dyn FileStore>,
    pub cache: Arc<dyn ContractCache>,
    pub sessions: Arc<dyn SessionStore>,
    /// Pluggable detector. Default: KeywordTypeDetector.
    pub detector: Arc<dyn TypeDetector>,
    /// Pluggable analysis engine. Default: LlmAnalysisEngine.
    pub engine: Arc<dyn AnalysisEngine>,
    pub config: Config,
}
