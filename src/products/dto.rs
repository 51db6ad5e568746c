use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::policy::Projection;
use crate::products::repo_types::{Product, ProductType, Quality};

/// Query string of `GET /productos`. Values are raw so sentinels survive.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    pub quality: Option<String>,
    pub search: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Keeps "field missing" apart from "field is null".
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default = "default_true")]
    pub available: bool,
    pub cost: Decimal,
    pub cash: Decimal,
    pub credit: Decimal,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<ProductType>,
    #[serde(default, deserialize_with = "double_option")]
    pub quality: Option<Option<String>>,
    pub available: Option<bool>,
    pub cost: Option<Decimal>,
    pub cash: Option<Decimal>,
    pub credit: Option<Decimal>,
}

/// Product as returned to a client, with role-based projection applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub quality: Option<Quality>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    pub cash: Decimal,
    pub credit: Decimal,
    pub company_id: Uuid,
    pub company_username: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ProductView {
    pub fn project(p: Product, projection: Projection) -> Self {
        Self {
            id: p.id,
            name: p.name,
            product_type: p.product_type,
            quality: p.quality,
            available: p.available,
            cost: match projection {
                Projection::Full => Some(p.cost),
                Projection::HideCost => None,
            },
            cash: p.cash,
            credit: p.credit,
            company_id: p.company_id,
            company_username: p.company_username,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}
