//! Shared application state handed to every handler.

use std::sync::Arc;

use auth::TokenIssuer;
use endpoint_manager::EndpointManager;
use persistence::Store;
use pool_manager::PoolManager;
use repository_analyzer::RepositoryAnalyzer;
use shared_bus::EndpointEventBus;
use state_manager::StateManager;
use sync_coordinator::SyncCoordinatorHandle;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenIssuer>,
    pub endpoints: Arc<EndpointManager>,
    pub pools: Arc<PoolManager>,
    pub states: Arc<StateManager>,
    pub analyzer: Arc<RepositoryAnalyzer>,
    pub sync: SyncCoordinatorHandle,
    pub events: Arc<EndpointEventBus>,
}
