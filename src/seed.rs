//! Bootstrap accounts and sample catalog entries.

use rust_decimal::Decimal;
use tracing::info;

use crate::{
    auth::{repo::UserStore, repo_types::User, services::create_user},
    config::SeedConfig,
    error::AppError,
    policy::Role,
    products::{
        repo::{NewProduct, ProductStore},
        repo_types::{ProductType, Quality},
    },
};

pub const ADMIN_USERNAME: &str = "admin";
pub const SELLER_USERNAME: &str = "vendedor";

/// Returns the user and whether it was created now.
async fn ensure_user(
    users: &dyn UserStore,
    username: &str,
    password: &str,
    role: Role,
) -> Result<(User, bool), AppError> {
    if let Some(existing) = users.find_by_username(username).await? {
        return Ok((existing, false));
    }
    let user = create_user(users, username, password, role).await?;
    Ok((user, true))
}

fn sample_products(company: &User) -> [NewProduct; 2] {
    [
        NewProduct {
            name: "Módulo iPhone 11".into(),
            product_type: ProductType::Module,
            quality: Some(Quality::Incell),
            available: true,
            cost: Decimal::new(205, 1),
            cash: Decimal::from(35),
            credit: Decimal::from(40),
            company_id: company.id,
        },
        NewProduct {
            name: "Batería Samsung S20".into(),
            product_type: ProductType::Battery,
            quality: Some(Quality::Original),
            available: true,
            cost: Decimal::from(15),
            cash: Decimal::from(25),
            credit: Decimal::from(30),
            company_id: company.id,
        },
    ]
}

/// Creates the default company and seller accounts when missing. Sample
/// products are only added together with a freshly created company account,
/// so reruns do not duplicate them.
pub async fn seed_defaults(
    users: &dyn UserStore,
    products: &dyn ProductStore,
    cfg: &SeedConfig,
) -> Result<(), AppError> {
    let (admin, admin_created) =
        ensure_user(users, ADMIN_USERNAME, &cfg.admin_password, Role::Company).await?;
    let (_, seller_created) =
        ensure_user(users, SELLER_USERNAME, &cfg.seller_password, Role::Seller).await?;

    if admin_created {
        for new in sample_products(&admin) {
            products.insert(new).await?;
        }
    }
    info!(admin_created, seller_created, "seed finished");
    Ok(())
}
