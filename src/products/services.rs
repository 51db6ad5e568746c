use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::claims::Identity,
    error::AppError,
    policy::{self, Role},
    products::{
        dto::{CreateProductRequest, ListQuery, ProductView, UpdateProductRequest},
        repo::{NewProduct, ProductChanges, ProductFilter, ProductStore, QualityFilter},
        repo_types::{ProductType, Quality},
    },
};

/// Knobs of the catalog service taken from configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogOptions {
    /// Restrict update/delete to the owning company.
    pub enforce_ownership: bool,
}

fn is_sentinel(raw: &str, words: &[&str]) -> bool {
    words.iter().any(|w| raw.eq_ignore_ascii_case(w))
}

fn is_no_quality(raw: &str) -> bool {
    is_sentinel(raw, &["NINGUNA", "none"])
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

/// Turns raw query values into a filter, honoring the "all" and "none"
/// sentinels.
pub fn parse_filter(query: ListQuery) -> Result<ProductFilter, AppError> {
    let product_type = match non_empty(query.product_type) {
        Some(raw) if is_sentinel(&raw, &["TODOS", "all"]) => None,
        Some(raw) => Some(
            raw.parse::<ProductType>()
                .map_err(|e| AppError::validation(e.to_string()))?,
        ),
        None => None,
    };
    let quality = match non_empty(query.quality) {
        Some(raw) if is_sentinel(&raw, &["TODAS", "all"]) => QualityFilter::Any,
        Some(raw) if is_no_quality(&raw) => QualityFilter::Absent,
        Some(raw) => QualityFilter::Is(
            raw.parse::<Quality>()
                .map_err(|e| AppError::validation(e.to_string()))?,
        ),
        None => QualityFilter::Any,
    };
    Ok(ProductFilter {
        product_type,
        quality,
        search: non_empty(query.search),
    })
}

/// Payload quality: missing, null or the sentinel mean "no quality".
fn parse_quality(raw: Option<&str>) -> Result<Option<Quality>, AppError> {
    match raw {
        None => Ok(None),
        Some(v) if v.trim().is_empty() || is_no_quality(v) => Ok(None),
        Some(v) => v
            .parse::<Quality>()
            .map(Some)
            .map_err(|e| AppError::validation(e.to_string())),
    }
}

fn check_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation {
            message: "Name must not be empty".into(),
            details: Some(json!({ "field": "name" })),
        });
    }
    Ok(trimmed.to_owned())
}

fn check_price(field: &'static str, value: Decimal) -> Result<Decimal, AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::Validation {
            message: format!("{field} must not be negative"),
            details: Some(json!({ "field": field, "value": value.to_string() })),
        });
    }
    Ok(value)
}

fn deny(role: Role, action: &str) -> AppError {
    warn!(?role, action, "catalog action forbidden");
    AppError::Forbidden(format!("Not allowed to {action} products"))
}

/// Catalog mutations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create,
    Update,
    Delete,
}

/// Role check alone. Handlers run it before decoding the path or body so a
/// non-company caller is refused whatever it sent.
pub fn authorize(who: &Identity, action: Mutation) -> Result<(), AppError> {
    let (allowed, verb) = match action {
        Mutation::Create => (policy::can_create(who.role), "create"),
        Mutation::Update => (policy::can_update(who.role), "update"),
        Mutation::Delete => (policy::can_delete(who.role), "delete"),
    };
    if allowed {
        Ok(())
    } else {
        Err(deny(who.role, verb))
    }
}

#[instrument(skip(store, query), fields(user_id = %who.id, role = ?who.role))]
pub async fn list(
    store: &dyn ProductStore,
    who: &Identity,
    query: ListQuery,
) -> Result<Vec<ProductView>, AppError> {
    if !policy::can_read(who.role) {
        return Err(deny(who.role, "list"));
    }
    let filter = parse_filter(query)?;
    let projection = policy::projection(who.role);
    let products = store.list(&filter).await?;
    Ok(products
        .into_iter()
        .map(|p| ProductView::project(p, projection))
        .collect())
}

#[instrument(skip(store, req), fields(user_id = %who.id, role = ?who.role))]
pub async fn create(
    store: &dyn ProductStore,
    who: &Identity,
    req: CreateProductRequest,
) -> Result<ProductView, AppError> {
    authorize(who, Mutation::Create)?;
    let new = NewProduct {
        name: check_name(&req.name)?,
        product_type: req.product_type,
        quality: parse_quality(req.quality.as_deref())?,
        available: req.available,
        cost: check_price("cost", req.cost)?,
        cash: check_price("cash", req.cash)?,
        credit: check_price("credit", req.credit)?,
        // always the caller, whatever the payload said
        company_id: who.id,
    };
    let product = store.insert(new).await?;
    info!(product_id = %product.id, "product created");
    Ok(ProductView::project(product, policy::projection(who.role)))
}

fn to_changes(req: UpdateProductRequest) -> Result<ProductChanges, AppError> {
    Ok(ProductChanges {
        name: req.name.as_deref().map(check_name).transpose()?,
        product_type: req.product_type,
        quality: req
            .quality
            .map(|q| parse_quality(q.as_deref()))
            .transpose()?,
        available: req.available,
        cost: req.cost.map(|v| check_price("cost", v)).transpose()?,
        cash: req.cash.map(|v| check_price("cash", v)).transpose()?,
        credit: req.credit.map(|v| check_price("credit", v)).transpose()?,
    })
}

async fn check_owner(
    store: &dyn ProductStore,
    who: &Identity,
    id: Uuid,
    action: &str,
) -> Result<(), AppError> {
    let product = store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    if product.company_id != who.id {
        warn!(product_id = %id, owner = %product.company_id, "not the owning company");
        return Err(AppError::Forbidden(format!(
            "Not allowed to {action} another company's products"
        )));
    }
    Ok(())
}

#[instrument(skip(store, req, opts), fields(user_id = %who.id, role = ?who.role))]
pub async fn update(
    store: &dyn ProductStore,
    who: &Identity,
    id: Uuid,
    req: UpdateProductRequest,
    opts: CatalogOptions,
) -> Result<ProductView, AppError> {
    authorize(who, Mutation::Update)?;
    let changes = to_changes(req)?;
    if opts.enforce_ownership {
        check_owner(store, who, id, "update").await?;
    }
    let product = store
        .update(id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
    info!(product_id = %product.id, "product updated");
    Ok(ProductView::project(product, policy::projection(who.role)))
}

#[instrument(skip(store, opts), fields(user_id = %who.id, role = ?who.role))]
pub async fn delete(
    store: &dyn ProductStore,
    who: &Identity,
    id: Uuid,
    opts: CatalogOptions,
) -> Result<(), AppError> {
    authorize(who, Mutation::Delete)?;
    if opts.enforce_ownership {
        check_owner(store, who, id, "delete").await?;
    }
    if !store.delete(id).await? {
        return Err(AppError::NotFound("Product not found".into()));
    }
    info!(product_id = %id, "product deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::repo::MemoryProductStore;

    fn identity(role: Role) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: format!("{role:?}").to_lowercase(),
            role,
        }
    }

    fn create_req(name: &str, t: ProductType, quality: Option<&str>) -> CreateProductRequest {
        CreateProductRequest {
            name: name.into(),
            product_type: t,
            quality: quality.map(str::to_owned),
            available: true,
            cost: Decimal::from(100),
            cash: Decimal::from(120),
            credit: Decimal::from(132),
        }
    }

    fn query(t: Option<&str>, q: Option<&str>, s: Option<&str>) -> ListQuery {
        ListQuery {
            product_type: t.map(str::to_owned),
            quality: q.map(str::to_owned),
            search: s.map(str::to_owned),
        }
    }

    async fn seeded(company: &Identity) -> MemoryProductStore {
        let store = MemoryProductStore::new();
        create(
            &store,
            company,
            create_req("Módulo iPhone 11", ProductType::Module, Some("INCELL")),
        )
        .await
        .unwrap();
        create(
            &store,
            company,
            create_req("Batería S20", ProductType::Battery, Some("NINGUNA")),
        )
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn non_company_roles_cannot_mutate() {
        let company = identity(Role::Company);
        let store = seeded(&company).await;
        let id = store.list(&ProductFilter::default()).await.unwrap()[0].id;

        for role in [Role::Seller, Role::Unrecognized] {
            let who = identity(role);
            let created = create(&store, &who, create_req("x", ProductType::Pin, None)).await;
            assert!(matches!(created, Err(AppError::Forbidden(_))));

            let updated = update(&store, &who, id, UpdateProductRequest::default(), CatalogOptions::default()).await;
            assert!(matches!(updated, Err(AppError::Forbidden(_))));

            // forbidden even for ids that do not exist
            let deleted = delete(&store, &who, Uuid::new_v4(), CatalogOptions::default()).await;
            assert!(matches!(deleted, Err(AppError::Forbidden(_))));
        }
    }

    #[test]
    fn authorize_admits_only_company() {
        for action in [Mutation::Create, Mutation::Update, Mutation::Delete] {
            assert!(authorize(&identity(Role::Company), action).is_ok());
            for role in [Role::Seller, Role::Unrecognized] {
                assert!(matches!(
                    authorize(&identity(role), action),
                    Err(AppError::Forbidden(_))
                ));
            }
        }
    }

    #[tokio::test]
    async fn seller_listing_hides_cost() {
        let company = identity(Role::Company);
        let store = seeded(&company).await;

        let as_company = list(&store, &company, ListQuery::default()).await.unwrap();
        assert!(as_company.iter().all(|p| p.cost.is_some()));

        let as_seller = list(&store, &identity(Role::Seller), ListQuery::default())
            .await
            .unwrap();
        assert_eq!(as_seller.len(), 2);
        assert!(as_seller.iter().all(|p| p.cost.is_none()));

        let unknown = list(&store, &identity(Role::Unrecognized), ListQuery::default()).await;
        assert!(matches!(unknown, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn filters_are_anded() {
        let company = identity(Role::Company);
        let store = seeded(&company).await;

        let rows = list(&store, &company, query(Some("MODULO"), None, Some("iphone")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Módulo iPhone 11");

        let none = list(&store, &company, query(Some("BATERIA"), None, Some("iphone")))
            .await
            .unwrap();
        assert!(none.is_empty());

        let all = list(&store, &company, query(Some("TODOS"), Some("TODAS"), Some("")))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn quality_sentinel_stores_and_filters_absent_quality() {
        let company = identity(Role::Company);
        let store = seeded(&company).await;

        let rows = list(&store, &company, query(None, Some("NINGUNA"), None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Batería S20");
        assert_eq!(rows[0].quality, None);

        let module_id = list(&store, &company, query(Some("MODULO"), None, None))
            .await
            .unwrap()[0]
            .id;
        let patch = UpdateProductRequest {
            quality: Some(Some("NINGUNA".into())),
            ..Default::default()
        };
        let updated = update(&store, &company, module_id, patch, CatalogOptions::default())
            .await
            .unwrap();
        assert_eq!(updated.quality, None);

        let rows = list(&store, &company, query(None, Some("none"), None))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn create_forces_owner_and_validates() {
        let company = identity(Role::Company);
        let store = MemoryProductStore::new();
        let view = create(&store, &company, create_req("  Pin C  ", ProductType::Pin, None))
            .await
            .unwrap();
        assert_eq!(view.company_id, company.id);
        assert_eq!(view.name, "Pin C");

        let blank = create(&store, &company, create_req("   ", ProductType::Pin, None)).await;
        assert!(matches!(blank, Err(AppError::Validation { .. })));

        let mut negative = create_req("Pin", ProductType::Pin, None);
        negative.cash = Decimal::from(-1);
        assert!(matches!(
            create(&store, &company, negative).await,
            Err(AppError::Validation { .. })
        ));

        let bad_quality = create(&store, &company, create_req("Pin", ProductType::Pin, Some("GOLD"))).await;
        assert!(matches!(bad_quality, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn unordered_prices_are_accepted() {
        let company = identity(Role::Company);
        let store = MemoryProductStore::new();
        let mut req = create_req("Flex", ProductType::Misc, None);
        req.cost = Decimal::from(50);
        req.cash = Decimal::from(40);
        req.credit = Decimal::from(30);
        let view = create(&store, &company, req).await.unwrap();
        assert_eq!(view.cost, Some(Decimal::from(50)));
        assert_eq!(view.credit, Decimal::from(30));
    }

    #[tokio::test]
    async fn update_is_partial_and_reports_missing_ids() {
        let company = identity(Role::Company);
        let store = seeded(&company).await;
        let original = store.list(&ProductFilter::default()).await.unwrap()[1].clone();

        let patch = UpdateProductRequest {
            available: Some(false),
            ..Default::default()
        };
        let view = update(&store, &company, original.id, patch, CatalogOptions::default())
            .await
            .unwrap();
        assert!(!view.available);
        assert_eq!(view.name, original.name);
        assert_eq!(view.quality, original.quality);
        assert_eq!(view.cost, Some(original.cost));

        let missing = update(
            &store,
            &company,
            Uuid::new_v4(),
            UpdateProductRequest::default(),
            CatalogOptions::default(),
        )
        .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_missing_id_is_not_found() {
        let company = identity(Role::Company);
        let store = seeded(&company).await;
        let id = store.list(&ProductFilter::default()).await.unwrap()[0].id;

        delete(&store, &company, id, CatalogOptions::default())
            .await
            .unwrap();
        let again = delete(&store, &company, id, CatalogOptions::default()).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn any_company_may_mutate_unless_ownership_is_enforced() {
        let owner = identity(Role::Company);
        let other = identity(Role::Company);
        let store = seeded(&owner).await;
        let id = store.list(&ProductFilter::default()).await.unwrap()[0].id;

        let rename = || UpdateProductRequest {
            name: Some("Renombrado".into()),
            ..Default::default()
        };
        update(&store, &other, id, rename(), CatalogOptions::default())
            .await
            .expect("open catalog allows cross-company edits");

        let strict = CatalogOptions {
            enforce_ownership: true,
        };
        let denied = update(&store, &other, id, rename(), strict).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
        let denied = delete(&store, &other, id, strict).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));

        update(&store, &owner, id, rename(), strict).await.unwrap();
        delete(&store, &owner, id, strict).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_updates_last_write_wins() {
        let company = identity(Role::Company);
        let store = seeded(&company).await;
        let id = store.list(&ProductFilter::default()).await.unwrap()[0].id;

        let patch = |cash: i64| UpdateProductRequest {
            cash: Some(Decimal::from(cash)),
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            update(&store, &company, id, patch(200), CatalogOptions::default()),
            update(&store, &company, id, patch(300), CatalogOptions::default()),
        );
        assert!(a.is_ok() && b.is_ok());

        let stored = store.get(id).await.unwrap().unwrap();
        assert!(stored.cash == Decimal::from(200) || stored.cash == Decimal::from(300));
    }

    #[test]
    fn unknown_filter_values_are_rejected() {
        assert!(matches!(
            parse_filter(query(Some("FLEX"), None, None)),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            parse_filter(query(None, Some("GOLD"), None)),
            Err(AppError::Validation { .. })
        ));
        let f = parse_filter(query(Some("all"), Some("SERVICEPACK"), Some("  "))).unwrap();
        assert_eq!(f.product_type, None);
        assert_eq!(f.quality, QualityFilter::Is(Quality::ServicePack));
        assert_eq!(f.search, None);
    }
}
