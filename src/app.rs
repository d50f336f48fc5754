use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/b/:id", get(handlers::bill_page))
        .route("/t/:id", get(handlers::tab_page))
        .route("/t/:id/join", post(handlers::join_tab))
        .with_state(state)
}
