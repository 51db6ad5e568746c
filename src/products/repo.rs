use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::products::repo_types::{Product, ProductRow, ProductType, Quality};

/// Columns of `p` (products) plus the owner's username from `u`.
const PRODUCT_COLUMNS: &str = "p.id, p.name, p.product_type, p.quality, p.available, p.cost, \
                               p.cash, p.credit, p.company_id, u.username AS company_username, \
                               p.created_at, p.updated_at";
const OWNER_JOIN: &str = "LEFT JOIN users u ON u.id = p.company_id";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QualityFilter {
    #[default]
    Any,
    Absent,
    Is(Quality),
}

/// Conjunctive listing filter.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub product_type: Option<ProductType>,
    pub quality: QualityFilter,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, p: &Product) -> bool {
        if self.product_type.is_some_and(|t| t != p.product_type) {
            return false;
        }
        let quality_ok = match self.quality {
            QualityFilter::Any => true,
            QualityFilter::Absent => p.quality.is_none(),
            QualityFilter::Is(q) => p.quality == Some(q),
        };
        if !quality_ok {
            return false;
        }
        match &self.search {
            Some(term) => p.name.to_lowercase().contains(&term.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub product_type: ProductType,
    pub quality: Option<Quality>,
    pub available: bool,
    pub cost: Decimal,
    pub cash: Decimal,
    pub credit: Decimal,
    pub company_id: Uuid,
}

/// Field-level patch. `quality: Some(None)` clears the quality.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub product_type: Option<ProductType>,
    pub quality: Option<Option<Quality>>,
    pub available: Option<bool>,
    pub cost: Option<Decimal>,
    pub cash: Option<Decimal>,
    pub credit: Option<Decimal>,
}

impl ProductChanges {
    fn apply(self, p: &mut Product) {
        if let Some(name) = self.name {
            p.name = name;
        }
        if let Some(t) = self.product_type {
            p.product_type = t;
        }
        if let Some(q) = self.quality {
            p.quality = q;
        }
        if let Some(a) = self.available {
            p.available = a;
        }
        if let Some(v) = self.cost {
            p.cost = v;
        }
        if let Some(v) = self.cash {
            p.cash = v;
        }
        if let Some(v) = self.credit {
            p.credit = v;
        }
    }
}

/// Product catalog storage. Each call touches at most one row, except `list`.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Newest first.
    async fn list(&self, filter: &ProductFilter) -> anyhow::Result<Vec<Product>>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Product>>;

    async fn insert(&self, new: NewProduct) -> anyhow::Result<Product>;

    /// `None` when no product has `id`. Unconditional write: last one wins.
    async fn update(&self, id: Uuid, changes: ProductChanges) -> anyhow::Result<Option<Product>>;

    /// `false` when no product has `id`.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn into_products(rows: Vec<ProductRow>) -> anyhow::Result<Vec<Product>> {
    rows.into_iter()
        .map(|r| Product::try_from(r).context("decode product row"))
        .collect()
}

#[derive(Clone)]
pub struct PgProductStore {
    db: PgPool,
}

impl PgProductStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self, filter: &ProductFilter) -> anyhow::Result<Vec<Product>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p {OWNER_JOIN} WHERE TRUE"));
        if let Some(t) = filter.product_type {
            qb.push(" AND p.product_type = ").push_bind(t.as_str());
        }
        match filter.quality {
            QualityFilter::Any => {}
            QualityFilter::Absent => {
                qb.push(" AND p.quality IS NULL");
            }
            QualityFilter::Is(q) => {
                qb.push(" AND p.quality = ").push_bind(q.as_str());
            }
        }
        if let Some(term) = &filter.search {
            qb.push(" AND p.name ILIKE ")
                .push_bind(format!("%{}%", escape_like(term)));
        }
        qb.push(" ORDER BY p.created_at DESC");

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(&self.db)
            .await
            .context("list products")?;
        into_products(rows)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p {OWNER_JOIN} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get product")?;
        row.map(|r| Product::try_from(r).context("decode product row"))
            .transpose()
    }

    async fn insert(&self, new: NewProduct) -> anyhow::Result<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            WITH p AS (
                INSERT INTO products
                    (id, name, product_type, quality, available, cost, cash, credit, company_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING *
            )
            SELECT {PRODUCT_COLUMNS} FROM p {OWNER_JOIN}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(new.product_type.as_str())
        .bind(new.quality.map(Quality::as_str))
        .bind(new.available)
        .bind(new.cost)
        .bind(new.cash)
        .bind(new.credit)
        .bind(new.company_id)
        .fetch_one(&self.db)
        .await
        .context("insert product")?;
        Ok(Product::try_from(row)?)
    }

    async fn update(&self, id: Uuid, changes: ProductChanges) -> anyhow::Result<Option<Product>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("WITH p AS (UPDATE products SET updated_at = now()");
        if let Some(name) = changes.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(t) = changes.product_type {
            qb.push(", product_type = ").push_bind(t.as_str());
        }
        if let Some(q) = changes.quality {
            qb.push(", quality = ").push_bind(q.map(Quality::as_str));
        }
        if let Some(a) = changes.available {
            qb.push(", available = ").push_bind(a);
        }
        if let Some(v) = changes.cost {
            qb.push(", cost = ").push_bind(v);
        }
        if let Some(v) = changes.cash {
            qb.push(", cash = ").push_bind(v);
        }
        if let Some(v) = changes.credit {
            qb.push(", credit = ").push_bind(v);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(
            " RETURNING *) SELECT {PRODUCT_COLUMNS} FROM p {OWNER_JOIN}"
        ));

        let row = qb
            .build_query_as::<ProductRow>()
            .fetch_optional(&self.db)
            .await
            .context("update product")?;
        row.map(|r| Product::try_from(r).context("decode product row"))
            .transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete product")?;
        Ok(done.rows_affected() > 0)
    }
}

/// Process-local catalog kept in insertion order.
#[derive(Default)]
pub struct MemoryProductStore {
    products: RwLock<Vec<Product>>,
    users: Option<Arc<dyn UserStore>>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves owner usernames through `users`, like the SQL join does.
    pub fn with_users(users: Arc<dyn UserStore>) -> Self {
        Self {
            products: RwLock::default(),
            users: Some(users),
        }
    }

    async fn owner_name(&self, company_id: Uuid) -> anyhow::Result<Option<String>> {
        let Some(users) = &self.users else {
            return Ok(None);
        };
        Ok(users.find_by_id(company_id).await?.map(|u| u.username))
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn list(&self, filter: &ProductFilter) -> anyhow::Result<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .rev()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, new: NewProduct) -> anyhow::Result<Product> {
        let company_username = self.owner_name(new.company_id).await?;
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            product_type: new.product_type,
            quality: new.quality,
            available: new.available,
            cost: new.cost,
            cash: new.cash,
            credit: new.credit,
            company_id: new.company_id,
            company_username,
            created_at: now,
            updated_at: now,
        };
        self.products.write().await.push(product.clone());
        Ok(product)
    }

    async fn update(&self, id: Uuid, changes: ProductChanges) -> anyhow::Result<Option<Product>> {
        let mut products = self.products.write().await;
        let Some(product) = products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        changes.apply(product);
        product.updated_at = OffsetDateTime::now_utc();
        Ok(Some(product.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| p.id != id);
        Ok(products.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(name: &str, t: ProductType, q: Option<Quality>) -> NewProduct {
        NewProduct {
            name: name.into(),
            product_type: t,
            quality: q,
            available: true,
            cost: Decimal::from(10),
            cash: Decimal::from(12),
            credit: Decimal::from(15),
            company_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("iphone"), "iphone");
    }

    #[tokio::test]
    async fn memory_list_is_newest_first_and_filtered() {
        let store = MemoryProductStore::new();
        store
            .insert(new_product("Módulo iPhone 11", ProductType::Module, Some(Quality::Incell)))
            .await
            .unwrap();
        store
            .insert(new_product("Batería S20", ProductType::Battery, None))
            .await
            .unwrap();

        let all = store.list(&ProductFilter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Batería S20", "Módulo iPhone 11"]);

        let absent = ProductFilter {
            quality: QualityFilter::Absent,
            ..Default::default()
        };
        let rows = store.list(&absent).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Batería S20");

        let search = ProductFilter {
            search: Some("MÓDULO".into()),
            ..Default::default()
        };
        assert_eq!(store.list(&search).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_update_and_delete_report_missing_ids() {
        let store = MemoryProductStore::new();
        let missing = Uuid::new_v4();
        assert!(store
            .update(missing, ProductChanges::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete(missing).await.unwrap());

        let p = store
            .insert(new_product("Pin Lightning", ProductType::Pin, Some(Quality::Original)))
            .await
            .unwrap();
        let changed = store
            .update(
                p.id,
                ProductChanges {
                    quality: Some(None),
                    cash: Some(Decimal::from(13)),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("product exists");
        assert_eq!(changed.quality, None);
        assert_eq!(changed.cash, Decimal::from(13));
        assert_eq!(changed.cost, Decimal::from(10));
        assert!(changed.updated_at >= p.updated_at);

        assert!(store.delete(p.id).await.unwrap());
        assert!(store.get(p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_resolves_owner_username() {
        use crate::{auth::repo::MemoryUserStore, policy::Role};

        let users = Arc::new(MemoryUserStore::new());
        let admin = users.insert("admin", "hash", Role::Company).await.unwrap();
        let store = MemoryProductStore::with_users(users);

        let mut new = new_product("Módulo A10", ProductType::Module, None);
        new.company_id = admin.id;
        store.insert(new).await.unwrap();
        let orphan = store
            .insert(new_product("Pin suelto", ProductType::Pin, None))
            .await
            .unwrap();

        let listed = store.list(&ProductFilter::default()).await.unwrap();
        assert_eq!(listed[1].company_username.as_deref(), Some("admin"));
        assert_eq!(orphan.company_username, None);
    }
}
