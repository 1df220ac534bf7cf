use crate::handlers;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/supply", get(handlers::supply))
        .route("/demand", get(handlers::demand))
        .route("/mix", get(handlers::mix))
        .route("/charts/:file", get(handlers::chart))
        .route("/assets/font.ttf", get(handlers::font))
        .with_state(state)
}
