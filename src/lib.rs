// MinerAdmin Library
//
// Administration console for a mining pool operator: projects, users,
// payout addresses and per-coin balances, behind an admin login.

pub mod balance;
pub mod coin;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod session;
pub mod store;
pub mod validate;
pub mod web;

pub use balance::{BalanceGroup, CoinAmount, LedgerRow, aggregate};
pub use coin::Coin;
pub use config::{Config, RunMode};
pub use credentials::{Credentials, Secret};
pub use error::AppError;
pub use gate::{AccessGate, AdminIdentity, GateOutcome};
pub use session::SessionIssuer;
pub use store::{MemoryStore, PgStore, Store};
pub use web::{AppState, router};
