// libs/payment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/create-order", post(handlers::create_order))
        .route("/verify", post(handlers::verify_payment))
        .route("/{payment_id}", get(handlers::get_payment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
