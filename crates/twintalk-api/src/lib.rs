//! HTTP/WebSocket realization of the twin ingestion core's CRUD façade
//! (§6). This crate only builds a `Router` and the state it closes over;
//! binding a listener and running the server is the host binary's job
//! (process bootstrap stays out of scope, per §1's non-goals).

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;
pub mod ws;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full router: twin/state CRUD plus the lifecycle-notification
/// WebSocket stream, wrapped in the teacher's own `tower-http` layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/twins", post(handlers::create_twin).get(handlers::list_twins))
        .route(
            "/twins/:id",
            get(handlers::view_twin)
                .put(handlers::update_twin)
                .delete(handlers::remove_twin),
        )
        .route("/twins/:id/states", get(handlers::list_states))
        .route("/notifications", get(ws::lifecycle_notifications))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
