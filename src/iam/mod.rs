use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod error;
pub mod handlers;
pub mod password;
pub mod payload;
pub mod service;

pub fn router() -> Router<AppState> {
    handlers::signup_routes()
}
