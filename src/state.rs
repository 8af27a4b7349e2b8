use crate::{config::Config, registry::SessionRegistry, repository::DynRepository};
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub repo: DynRepository,
    pub sessions: SessionRegistry,
    pub config: Config,
}

impl FromRef<AppState> for DynRepository {
    fn from_ref(state: &AppState) -> Self {
        state.repo.clone()
    }
}

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
