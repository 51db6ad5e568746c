//! Cascading margin pricing: cost, then cash, then credit.
//!
//! The server never recomputes stored prices; these endpoints only back the
//! product form.

pub mod calculator;
pub mod handlers;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::pricing_routes()
}
