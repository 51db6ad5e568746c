use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    products::{
        dto::{CreateProductRequest, DeletedResponse, ListQuery, ProductView, UpdateProductRequest},
        services::{self, CatalogOptions, Mutation},
    },
    state::AppState,
};

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/productos", get(list_products).post(create_product))
        .route("/productos/:id", put(update_product).delete(delete_product))
}

fn options(state: &AppState) -> CatalogOptions {
    CatalogOptions {
        enforce_ownership: state.config.enforce_ownership,
    }
}

#[instrument(skip(state, query))]
pub async fn list_products(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<ProductView>>, AppError> {
    let Query(query) = query?;
    let items = services::list(state.products.as_ref(), &who, query).await?;
    Ok(Json(items))
}

// Mutations take raw extractor results: the role check runs before the path
// or body is decoded.

#[instrument(skip(state, body))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    body: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<Json<ProductView>, AppError> {
    services::authorize(&who, Mutation::Create)?;
    let Json(body) = body?;
    let view = services::create(state.products.as_ref(), &who, body).await?;
    Ok(Json(view))
}

#[instrument(skip(state, id, body))]
pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductView>, AppError> {
    services::authorize(&who, Mutation::Update)?;
    let Path(id) = id?;
    let Json(body) = body?;
    let view = services::update(state.products.as_ref(), &who, id, body, options(&state)).await?;
    Ok(Json(view))
}

#[instrument(skip(state, id))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(who): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeletedResponse>, AppError> {
    services::authorize(&who, Mutation::Delete)?;
    let Path(id) = id?;
    services::delete(state.products.as_ref(), &who, id, options(&state)).await?;
    Ok(Json(DeletedResponse {
        message: "Product deleted".into(),
    }))
}
