use crate::handlers::{account, order, ws};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .route("/logout", post(account::logout))
        .route("/me", get(account::me))
        .route("/profile", get(account::profile))
        .route("/orders", post(order::create_order).get(order::list_orders))
        .route("/orders/:id/cancel", post(order::cancel_order))
        .route("/orderbook", get(order::orderbook))
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
