use crate::auth::repo::{MemoryUserStore, PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::db;
use crate::products::repo::{MemoryProductStore, PgProductStore, ProductStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
}

impl AppState {
    /// Connects to Postgres, applies migrations and wires the SQL stores.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await;

        Ok(Self::from_parts(
            Arc::new(config),
            Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>,
            Arc::new(PgProductStore::new(pool)) as Arc<dyn ProductStore>,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        products: Arc<dyn ProductStore>,
    ) -> Self {
        Self {
            config,
            users,
            products,
        }
    }

    /// State backed by process-local stores; nothing touches a database.
    pub fn in_memory(config: AppConfig) -> Self {
        let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        Self::from_parts(
            Arc::new(config),
            users.clone(),
            Arc::new(MemoryProductStore::with_users(users)),
        )
    }
}
