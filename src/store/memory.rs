// In-process store
// Mirrors the PostgreSQL schema and query ordering without a database

use super::{Admin, AdminRecord, Project, Store, StoreError, StoreResult, User, UserAddresses};
use crate::balance::LedgerRow;
use crate::coin::Coin;
use async_trait::async_trait;
use bigdecimal::{BigDecimal, Zero};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct LedgerEntry {
    project_id: i64,
    address: String,
    coin: Coin,
    amount: BigDecimal,
}

#[derive(Debug, Clone)]
struct UserAddress {
    user_id: i64,
    coin: Coin,
    address: String,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    projects: BTreeMap<i64, Project>,
    admins: BTreeMap<i64, AdminRecord>,
    users: BTreeMap<i64, User>,
    addresses: Vec<UserAddress>,
    ledger: Vec<LedgerEntry>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a ledger entry, the equivalent of a row in `balances`
    pub async fn ledger_credit(&self, project_id: i64, address: &str, coin: Coin, amount: BigDecimal) {
        self.tables.write().await.ledger.push(LedgerEntry {
            project_id,
            address: address.to_string(),
            coin,
            amount,
        });
    }
}

/// Sum amounts per coin symbol; BTreeMap keeps the SQL `coin ASC` order
fn sum_by_coin<'a>(entries: impl Iterator<Item = &'a LedgerEntry>) -> BTreeMap<&'static str, BigDecimal> {
    let mut sums = BTreeMap::new();
    for entry in entries {
        *sums.entry(entry.coin.symbol()).or_insert_with(BigDecimal::zero) += &entry.amount;
    }
    sums
}

#[async_trait]
impl Store for MemoryStore {
    async fn project_get(&self, id: i64) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn project_add(&self, name: &str) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        tables.projects.insert(
            id,
            Project {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn project_set_name(&self, id: i64, name: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let project = tables
            .projects
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("project", id))?;
        project.name = name.to_string();
        Ok(())
    }

    async fn project_remove(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.projects.remove(&id).is_none() {
            return Err(StoreError::not_found("project", id));
        }
        tables.ledger.retain(|entry| entry.project_id != id);
        Ok(())
    }

    async fn projects_balance_rows(&self) -> StoreResult<Vec<LedgerRow<i64>>> {
        let tables = self.tables.read().await;

        let mut projects: Vec<&Project> = tables.projects.values().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let mut rows = Vec::new();
        for project in projects {
            let sums = sum_by_coin(tables.ledger.iter().filter(|e| e.project_id == project.id));
            if sums.is_empty() {
                rows.push(LedgerRow::empty(project.id).with_name(&project.name));
                continue;
            }
            for (coin, amount) in sums {
                rows.push(LedgerRow::new(project.id, coin, amount.to_plain_string()).with_name(&project.name));
            }
        }
        Ok(rows)
    }

    async fn project_users_balance_rows(
        &self,
        project_id: i64,
    ) -> StoreResult<Vec<LedgerRow<String>>> {
        let tables = self.tables.read().await;

        let mut users: Vec<&User> = tables.users.values().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));

        let ledger = &tables.ledger;
        let mut rows = Vec::new();
        for user in users {
            // Join semantics: every (address, ledger entry) match counts
            let entries = tables
                .addresses
                .iter()
                .filter(|ua| ua.user_id == user.id)
                .flat_map(|ua| {
                    ledger
                        .iter()
                        .filter(move |e| e.project_id == project_id && e.address == ua.address)
                });
            for (coin, amount) in sum_by_coin(entries) {
                rows.push(LedgerRow::new(user.email.clone(), coin, amount.to_plain_string()));
            }
        }
        Ok(rows)
    }

    async fn admin_insert(&self, login: &str, password_hash: &[u8]) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        if tables.admins.values().any(|a| a.login == login) {
            return Err(StoreError::conflict("admin", login));
        }
        let id = tables.next_id();
        tables.admins.insert(
            id,
            AdminRecord {
                id,
                login: login.to_string(),
                password_hash: password_hash.to_vec(),
            },
        );
        Ok(id)
    }

    async fn admin_by_login(&self, login: &str) -> StoreResult<Option<AdminRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.admins.values().find(|a| a.login == login).cloned())
    }

    async fn admin_set_password(&self, id: i64, password_hash: &[u8]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let admin = tables
            .admins
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("admin", id))?;
        admin.password_hash = password_hash.to_vec();
        Ok(())
    }

    async fn admin_remove(&self, id: i64) -> StoreResult<()> {
        match self.tables.write().await.admins.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found("admin", id)),
        }
    }

    async fn admins_list(&self) -> StoreResult<Vec<Admin>> {
        let tables = self.tables.read().await;
        let mut admins: Vec<Admin> = tables
            .admins
            .values()
            .map(|a| Admin {
                id: a.id,
                login: a.login.clone(),
            })
            .collect();
        admins.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(admins)
    }

    async fn user_get(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_add(&self, email: &str, name: &str) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::conflict("user", email));
        }
        let id = tables.next_id();
        tables.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    async fn users_list(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn user_addresses(&self, user_id: i64) -> StoreResult<UserAddresses> {
        let tables = self.tables.read().await;
        let mut addresses = UserAddresses::new();
        for ua in tables.addresses.iter().filter(|ua| ua.user_id == user_id) {
            addresses.entry(ua.coin).or_default().push(ua.address.clone());
        }
        for list in addresses.values_mut() {
            list.sort();
        }
        Ok(addresses)
    }

    async fn user_address_add(&self, user_id: i64, coin: Coin, address: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        let exists = tables
            .addresses
            .iter()
            .any(|ua| ua.user_id == user_id && ua.coin == coin && ua.address == address);
        if exists {
            return Err(StoreError::conflict("user address", address));
        }
        tables.addresses.push(UserAddress {
            user_id,
            coin,
            address: address.to_string(),
        });
        Ok(())
    }

    async fn user_address_remove(
        &self,
        user_id: i64,
        coin: Coin,
        address: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.addresses.len();
        tables
            .addresses
            .retain(|ua| !(ua.user_id == user_id && ua.coin == coin && ua.address == address));
        if tables.addresses.len() == before {
            return Err(StoreError::not_found("user address", address));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_project_lifecycle() {
        let store = MemoryStore::new();
        let id = store.project_add("Alpha").await.unwrap();

        store.project_set_name(id, "Omega").await.unwrap();
        let project = store.project_get(id).await.unwrap().unwrap();
        assert_eq!(project.name, "Omega");

        store.project_remove(id).await.unwrap();
        assert!(store.project_get(id).await.unwrap().is_none());
        assert!(store.project_remove(id).await.unwrap_err().is_not_found());
        assert!(store.project_set_name(id, "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_admin_login_is_unique() {
        let store = MemoryStore::new();
        store.admin_insert("alice", b"hash").await.unwrap();

        let err = store.admin_insert("alice", b"other").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // Case sensitive
        store.admin_insert("Alice", b"hash").await.unwrap();
    }

    #[tokio::test]
    async fn test_admins_list_sorted_by_login() {
        let store = MemoryStore::new();
        store.admin_insert("zoe", b"h").await.unwrap();
        store.admin_insert("bob", b"h").await.unwrap();

        let logins: Vec<String> = store
            .admins_list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.login)
            .collect();
        assert_eq!(logins, vec!["bob", "zoe"]);
    }

    #[tokio::test]
    async fn test_user_addresses_grouped_by_coin() {
        let store = MemoryStore::new();
        let user = store.user_add("u@pool.io", "U").await.unwrap();
        store.user_address_add(user, Coin::Ltc, "l1").await.unwrap();
        store.user_address_add(user, Coin::Btc, "b1").await.unwrap();
        store.user_address_add(user, Coin::Btc, "b2").await.unwrap();

        let addresses = store.user_addresses(user).await.unwrap();
        assert_eq!(addresses[&Coin::Btc], vec!["b1", "b2"]);
        assert_eq!(addresses[&Coin::Ltc], vec!["l1"]);

        store.user_address_remove(user, Coin::Btc, "b1").await.unwrap();
        let err = store.user_address_remove(user, Coin::Btc, "b1").await.unwrap_err();
        assert!(err.is_not_found());

        let err = store.user_address_add(999, Coin::Btc, "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_balance_rows_keep_sum_scale() {
        let store = MemoryStore::new();
        let project = store.project_add("Alpha").await.unwrap();
        store
            .ledger_credit(project, "a", Coin::Btc, BigDecimal::from_str("3.000").unwrap())
            .await;
        store
            .ledger_credit(project, "b", Coin::Btc, BigDecimal::from_str("0.100").unwrap())
            .await;

        let rows = store.projects_balance_rows().await.unwrap();
        assert_eq!(
            rows,
            vec![LedgerRow::new(project, "BTC", "3.100").with_name("Alpha")]
        );
    }
}
