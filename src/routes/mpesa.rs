use axum::{
    routing::{any, post},
    Router,
};

use crate::handlers::mpesa_handlers;
use crate::state::AppState;

pub fn mpesa_routes() -> Router<AppState> {
    Router::new()
        .route("/pay", any(mpesa_handlers::initiate_payment))
        .route("/callback", post(mpesa_handlers::mpesa_callback))
}
