use crate::state::AppState;
use axum::Router;

mod dto;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod ledger;
pub mod phone;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::payment_routes()
}
