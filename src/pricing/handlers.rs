use axum::{extract::rejection::JsonRejection, routing::post, Json, Router};
use serde_json::json;
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    pricing::calculator::{self, Margins, PriceTiers, MARGIN_STEPS},
    state::AppState,
};

pub fn pricing_routes() -> Router<AppState> {
    Router::new()
        .route("/pricing/quote", post(quote))
        .route("/pricing/margins", post(margins))
}

/// Cascade preview for the product form.
#[instrument(skip_all)]
pub async fn quote(
    AuthUser(_who): AuthUser,
    body: Result<Json<Margins>, JsonRejection>,
) -> Result<Json<PriceTiers>, AppError> {
    let Json(body) = body?;
    if let Some((field, value)) = body.first_disallowed() {
        return Err(AppError::Validation {
            message: format!("{field} must be one of {MARGIN_STEPS:?}"),
            details: Some(json!({ "field": field, "value": value })),
        });
    }
    let tiers = calculator::quote(&body).ok_or_else(|| AppError::Validation {
        message: "baseCost is too large to price".into(),
        details: Some(json!({ "field": "baseCost" })),
    })?;
    Ok(Json(tiers))
}

/// Best-effort margins for editing stored prices.
#[instrument(skip_all)]
pub async fn margins(
    AuthUser(_who): AuthUser,
    body: Result<Json<PriceTiers>, JsonRejection>,
) -> Result<Json<Margins>, AppError> {
    let Json(body) = body?;
    Ok(Json(calculator::reconstruct(&body)))
}
