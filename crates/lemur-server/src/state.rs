use crate::destroyer::Destroyer;
use lemur_core::state::RunState;
use lemur_core::task::TaskStore;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub destroyer: Arc<Destroyer>,
    pub tasks: Arc<TaskStore>,
    pub run_state: Arc<RunState>,
}

impl AppState {
    pub fn new(destroyer: Arc<Destroyer>) -> Self {
        Self {
            tasks: Arc::clone(destroyer.tasks()),
            run_state: Arc::clone(destroyer.run_state()),
            destroyer,
        }
    }
}
