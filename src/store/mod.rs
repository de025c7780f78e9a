// Storage capability set
// Everything the console needs from persistence, behind one trait

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::balance::LedgerRow;
use crate::coin::Coin;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl ToString) -> Self {
        Self::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
}

/// Administrator as shown in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admin {
    pub id: i64,
    pub login: String,
}

/// Stored administrator credentials
#[derive(Clone, PartialEq, Eq)]
pub struct AdminRecord {
    pub id: i64,
    pub login: String,
    pub password_hash: Vec<u8>,
}

impl std::fmt::Debug for AdminRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminRecord")
            .field("id", &self.id)
            .field("login", &self.login)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

/// Payout addresses of a user grouped by coin
pub type UserAddresses = BTreeMap<Coin, Vec<String>>;

/// Persistence operations of the console.
///
/// Implementations: [`PgStore`] for PostgreSQL and [`MemoryStore`] for tests
/// and local runs. The two balance queries return rows sorted the way
/// [`crate::balance::aggregate`] requires.
#[async_trait]
pub trait Store: Send + Sync {
    // === Projects ===

    async fn project_get(&self, id: i64) -> StoreResult<Option<Project>>;

    async fn project_add(&self, name: &str) -> StoreResult<i64>;

    async fn project_set_name(&self, id: i64, name: &str) -> StoreResult<()>;

    async fn project_remove(&self, id: i64) -> StoreResult<()>;

    // === Balances ===

    /// Coin sums of every project, projects without balances included,
    /// ordered by project name then coin
    async fn projects_balance_rows(&self) -> StoreResult<Vec<LedgerRow<i64>>>;

    /// Coin sums per user email inside one project, ordered by email then coin
    async fn project_users_balance_rows(&self, project_id: i64)
        -> StoreResult<Vec<LedgerRow<String>>>;

    // === Admins ===

    async fn admin_insert(&self, login: &str, password_hash: &[u8]) -> StoreResult<i64>;

    async fn admin_by_login(&self, login: &str) -> StoreResult<Option<AdminRecord>>;

    async fn admin_set_password(&self, id: i64, password_hash: &[u8]) -> StoreResult<()>;

    async fn admin_remove(&self, id: i64) -> StoreResult<()>;

    /// All admins ordered by login
    async fn admins_list(&self) -> StoreResult<Vec<Admin>>;

    // === Users ===

    async fn user_get(&self, id: i64) -> StoreResult<Option<User>>;

    async fn user_add(&self, email: &str, name: &str) -> StoreResult<i64>;

    async fn users_list(&self) -> StoreResult<Vec<User>>;

    async fn user_addresses(&self, user_id: i64) -> StoreResult<UserAddresses>;

    async fn user_address_add(&self, user_id: i64, coin: Coin, address: &str) -> StoreResult<()>;

    async fn user_address_remove(&self, user_id: i64, coin: Coin, address: &str)
        -> StoreResult<()>;
}
