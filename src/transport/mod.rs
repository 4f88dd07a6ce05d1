//! Axum router exposing the REST and WebSocket surfaces (§6, C11). Both
//! share one [`http::AppState`] handle to the [`crate::table::TableManager`].

pub mod http;
pub mod response;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use http::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/tables", get(http::list_tables).post(http::create_table))
        .route("/tables/:table_id", get(http::get_table).delete(http::delete_table))
        .route("/tables/:table_id/join", post(http::join_table))
        .route("/tables/:table_id/leave", post(http::leave_table))
        .route("/tables/:table_id/add-bot", post(http::add_bot))
        .route("/tables/:table_id/remove-bot", post(http::remove_bot))
        .route("/tables/:table_id/start-game", post(http::start_game))
        .route("/tables/:table_id/take-turn", post(http::take_turn))
        .route("/tables/:table_id/take-automatic-turn", post(http::take_automatic_turn))
        .route("/tables/:table_id/cancel-game", post(http::cancel_game))
        .route("/tables/:table_id/abort-game", post(http::abort_game))
        .route("/tables/:table_id/history", get(http::history))
        .route("/ws/tables/:table_id/", get(ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
