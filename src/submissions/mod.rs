use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::upload_routes(upload_max_bytes))
        .merge(handlers::staff_routes())
}
