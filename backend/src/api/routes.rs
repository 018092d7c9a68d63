use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers::*;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Safe routes
        .route("/safes", get(list_safes))
        .route("/safes/open", post(open_safe))
        .route("/safes/borrow", post(borrow))
        .route("/safes/repay", post(repay))
        .route("/safes/close", post(close_safe))
        .route("/safes/:owner/:collateral", get(get_safe))

        // Monitoring routes
        .route("/statistics", get(get_statistics))
        .route("/prices", get(get_prices))
        .route("/prices/:collateral", put(set_price))

        // Account routes
        .route("/accounts/faucet", post(faucet))
        .route("/accounts/approve", post(approve))
        .route("/accounts/:address/balances", get(get_balances))

        // WebSocket route
        .route("/ws", get(super::websocket::ws_handler))

        .with_state(state)
}
