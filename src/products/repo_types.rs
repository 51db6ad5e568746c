use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

/// Part category.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum ProductType {
    #[serde(rename = "MODULO")]
    Module,
    #[serde(rename = "BATERIA")]
    Battery,
    #[serde(rename = "PIN")]
    Pin,
    #[serde(rename = "VARIOS")]
    Misc,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Module => "MODULO",
            ProductType::Battery => "BATERIA",
            ProductType::Pin => "PIN",
            ProductType::Misc => "VARIOS",
        }
    }
}

impl FromStr for ProductType {
    type Err = UnknownValue;

    /// Case-insensitive; English names are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MODULO" | "MODULE" => Ok(ProductType::Module),
            "BATERIA" | "BATTERY" => Ok(ProductType::Battery),
            "PIN" => Ok(ProductType::Pin),
            "VARIOS" | "MISC" => Ok(ProductType::Misc),
            _ => Err(UnknownValue {
                kind: "type",
                value: s.to_owned(),
            }),
        }
    }
}

/// Part grade. A product may have none.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum Quality {
    #[serde(rename = "INCELL")]
    Incell,
    #[serde(rename = "OLED")]
    Oled,
    #[serde(rename = "ORIGINAL")]
    Original,
    #[serde(rename = "SERVICEPACK")]
    ServicePack,
    #[serde(rename = "REMANOFACTURADO")]
    Remanufactured,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Incell => "INCELL",
            Quality::Oled => "OLED",
            Quality::Original => "ORIGINAL",
            Quality::ServicePack => "SERVICEPACK",
            Quality::Remanufactured => "REMANOFACTURADO",
        }
    }
}

impl FromStr for Quality {
    type Err = UnknownValue;

    /// Case-insensitive; English names are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INCELL" => Ok(Quality::Incell),
            "OLED" => Ok(Quality::Oled),
            "ORIGINAL" => Ok(Quality::Original),
            "SERVICEPACK" | "SERVICE_PACK" => Ok(Quality::ServicePack),
            "REMANOFACTURADO" | "REMANUFACTURED" => Ok(Quality::Remanufactured),
            _ => Err(UnknownValue {
                kind: "quality",
                value: s.to_owned(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for ProductType {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(de)?;
        raw.parse().map_err(D::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(de)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// Raw `products` row; enum columns are text.
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub product_type: String,
    pub quality: Option<String>,
    pub available: bool,
    pub cost: Decimal,
    pub cash: Decimal,
    pub credit: Decimal,
    pub company_id: Uuid,
    /// Joined from `users`; `None` if the owner row is gone.
    pub company_username: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Catalog entry. Prices are stored as given; no ordering between tiers is
/// enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub product_type: ProductType,
    pub quality: Option<Quality>,
    pub available: bool,
    pub cost: Decimal,
    pub cash: Decimal,
    pub credit: Decimal,
    pub company_id: Uuid,
    pub company_username: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ProductRow> for Product {
    type Error = UnknownValue;

    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            name: r.name,
            product_type: r.product_type.parse()?,
            quality: r.quality.as_deref().map(str::parse).transpose()?,
            available: r.available,
            cost: r.cost,
            cash: r.cash,
            credit: r.credit,
            company_id: r.company_id,
            company_username: r.company_username,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
