// Balance aggregation
// Turns flat (entity, coin, sum) ledger rows into per-entity coin lists

use crate::store::{Store, StoreError};
use bigdecimal::{BigDecimal, ParseBigDecimalError};
use serde::Serialize;
use thiserror::Error;

/// One row of a grouped ledger query.
///
/// `coin` and `amount` are `None` when the entity has no ledger activity
/// (the LEFT JOIN side of the query produced NULLs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow<K> {
    pub key: K,
    pub name: Option<String>,
    pub coin: Option<String>,
    pub amount: Option<String>,
}

impl<K> LedgerRow<K> {
    pub fn new(key: K, coin: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            key,
            name: None,
            coin: Some(coin.into()),
            amount: Some(amount.into()),
        }
    }

    /// Row for an entity without any coin activity
    pub fn empty(key: K) -> Self {
        Self {
            key,
            name: None,
            coin: None,
            amount: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinAmount {
    pub coin: String,
    pub amount: String,
}

/// Aggregated coin list of a single entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceGroup<K> {
    pub key: K,
    pub name: Option<String>,
    pub coins: Vec<CoinAmount>,
}

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("invalid amount {amount:?} for coin {coin}: {source}")]
    Decode {
        coin: String,
        amount: String,
        #[source]
        source: ParseBigDecimalError,
    },
}

/// Canonical decimal string: fractional zero padding and a dangling point
/// are stripped, the value itself is never rounded. Precision is unbounded
/// and the result is always plain notation.
pub fn normalize_amount(amount: &str) -> Result<String, ParseBigDecimalError> {
    let value: BigDecimal = amount.trim().parse()?;
    Ok(value.normalized().to_plain_string())
}

/// Group consecutive rows sharing a key.
///
/// Rows must arrive sorted by key (then coin), which the ledger queries
/// guarantee with their ORDER BY. Groups keep the order in which their key
/// first shows up and coins keep row order. Any undecodable amount fails the
/// whole call.
pub fn aggregate<K, I>(rows: I) -> Result<Vec<BalanceGroup<K>>, AggregationError>
where
    K: PartialEq,
    I: IntoIterator<Item = LedgerRow<K>>,
{
    let mut groups: Vec<BalanceGroup<K>> = Vec::new();

    for row in rows {
        let (coin, amount) = match (row.coin, row.amount) {
            (Some(coin), Some(amount)) => (coin, amount),
            _ => {
                groups.push(BalanceGroup {
                    key: row.key,
                    name: row.name,
                    coins: Vec::new(),
                });
                continue;
            }
        };

        let amount = match normalize_amount(&amount) {
            Ok(normalized) => normalized,
            Err(source) => {
                return Err(AggregationError::Decode {
                    coin,
                    amount,
                    source,
                });
            }
        };
        let entry = CoinAmount { coin, amount };

        match groups.last_mut() {
            Some(last) if last.key == row.key => last.coins.push(entry),
            _ => groups.push(BalanceGroup {
                key: row.key,
                name: row.name,
                coins: vec![entry],
            }),
        }
    }

    Ok(groups)
}

/// Balances of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectBalance {
    pub project_id: i64,
    pub project_name: String,
    pub coins: Vec<CoinAmount>,
}

/// Balances of one user within a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserBalance {
    pub email: String,
    pub coins: Vec<CoinAmount>,
}

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
}

/// Every project with its coin totals, ordered by project name
pub async fn projects_balances<S>(store: &S) -> Result<Vec<ProjectBalance>, BalanceError>
where
    S: Store + ?Sized,
{
    let rows = store.projects_balance_rows().await?;
    let balances = aggregate(rows)?
        .into_iter()
        .map(|group| ProjectBalance {
            project_id: group.key,
            project_name: group.name.unwrap_or_default(),
            coins: group.coins,
        })
        .collect();
    Ok(balances)
}

/// Per-user coin totals inside one project, ordered by email
pub async fn project_users_balances<S>(
    store: &S,
    project_id: i64,
) -> Result<Vec<UserBalance>, BalanceError>
where
    S: Store + ?Sized,
{
    let rows = store.project_users_balance_rows(project_id).await?;
    let balances = aggregate(rows)?
        .into_iter()
        .map(|group| UserBalance {
            email: group.key,
            coins: group.coins,
        })
        .collect();
    Ok(balances)
}
