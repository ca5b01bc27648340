pub mod destroyer;
pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use destroyer::Destroyer;
use lemur_core::config::Config;
use lemur_core::fate::{RandomFateEngine, ThreadRandom};
use lemur_core::state::RunState;
use lemur_core::task::TaskStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Assemble a destroyer from configuration: backend, reporter, fate engine,
/// a fresh task store and the initial run state.
pub fn build_destroyer(config: &Config) -> lemur_core::Result<Arc<Destroyer>> {
    let infrastructure = lemur_core::infrastructure::from_config(config)?;
    let reporter = lemur_core::reporter::from_config(&config.reporter)?;
    let fate_engine = Arc::new(RandomFateEngine::from_config(config, Box::new(ThreadRandom)));

    let destroyer = Destroyer::new(
        infrastructure,
        fate_engine,
        reporter,
        Arc::new(TaskStore::new()),
        Arc::new(RunState::new(config.state)),
    )
    .with_dry_run(config.dry_run)
    .with_max_concurrency(config.max_concurrency);

    Ok(Arc::new(destroyer))
}

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    Router::new()
        .route("/destroy", post(routes::destroy::destroy))
        .route("/chaos", post(routes::destroy::chaos))
        .route("/task/{id}", get(routes::tasks::get_task))
        .route("/tasks", get(routes::tasks::list_tasks))
        .route(
            "/state",
            get(routes::state::get_state).post(routes::state::set_state),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the control API on a pre-bound listener and drive the cron schedule
/// until the server stops.
pub async fn serve_on(config: &Config, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let schedule = config.schedule()?;
    let destroyer = build_destroyer(config)?;

    tracing::info!(schedule = %config.schedule, "destruction schedule");
    if destroyer.is_dry_run() {
        tracing::warn!("dry run enabled: no member will be destroyed");
    }

    let scheduler = scheduler::spawn(Arc::clone(&destroyer), schedule);
    let app = build_router(state::AppState::new(destroyer));

    let port = listener.local_addr()?.port();
    tracing::info!("chaos lemur listening on http://localhost:{port}");

    let result = axum::serve(listener, app).await;
    scheduler.abort();
    result?;
    Ok(())
}
