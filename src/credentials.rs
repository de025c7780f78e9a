// Administrator credentials
// Password generation, bcrypt hashing and the admin lifecycle on top of a Store

use crate::store::{Admin, Store, StoreError};
use rand::rngs::{OsRng, StdRng};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Length of generated passwords
pub const PASSWORD_LENGTH: usize = 12;
/// Minimum number of digits in a generated password
pub const PASSWORD_DIGITS: usize = 4;
/// Minimum number of symbols in a generated password
pub const PASSWORD_SYMBOLS: usize = 4;
/// bcrypt only looks at the first 72 bytes of its input
pub const MAX_SECRET_BYTES: usize = 72;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"~!@#$%^&*()_+`-={}|[]\\:\"<>?,./";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to generate password: {0}")]
    Generate(#[source] rand::Error),

    #[error("password exceeds {MAX_SECRET_BYTES} bytes")]
    SecretTooLong,

    #[error("failed to hash password: {0}")]
    Hash(#[source] bcrypt::BcryptError),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("password worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One-time plaintext password, handed out once and never stored
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Generate a random password of [`PASSWORD_LENGTH`] characters with at least
/// [`PASSWORD_DIGITS`] digits and [`PASSWORD_SYMBOLS`] symbols.
///
/// The generator is seeded from the operating system entropy source; if that
/// source is unavailable the call fails instead of falling back.
pub fn generate_password() -> Result<Secret, CredentialError> {
    let mut rng = StdRng::from_rng(OsRng).map_err(CredentialError::Generate)?;

    let mut chars: Vec<u8> = Vec::with_capacity(PASSWORD_LENGTH);
    for _ in 0..PASSWORD_DIGITS {
        chars.push(pick(&mut rng, DIGITS));
    }
    for _ in 0..PASSWORD_SYMBOLS {
        chars.push(pick(&mut rng, SYMBOLS));
    }
    while chars.len() < PASSWORD_LENGTH {
        chars.push(pick(&mut rng, LETTERS));
    }
    chars.shuffle(&mut rng);

    Ok(Secret(chars.into_iter().map(char::from).collect()))
}

fn pick<R: Rng>(rng: &mut R, alphabet: &[u8]) -> u8 {
    alphabet[rng.gen_range(0..alphabet.len())]
}

/// Salted bcrypt hash of `secret`, ready for storage
pub fn hash_password(secret: &str, cost: u32) -> Result<Vec<u8>, CredentialError> {
    if secret.len() > MAX_SECRET_BYTES {
        return Err(CredentialError::SecretTooLong);
    }
    let hash = bcrypt::hash(secret, cost).map_err(CredentialError::Hash)?;
    Ok(hash.into_bytes())
}

/// Compare `candidate` against a stored hash.
///
/// A mismatch is `Ok(false)`; only a hash that cannot be parsed is an error.
pub fn verify_password(hash: &[u8], candidate: &str) -> Result<bool, CredentialError> {
    let hash = std::str::from_utf8(hash)
        .map_err(|_| CredentialError::MalformedHash("not valid UTF-8".to_string()))?;
    bcrypt::verify(candidate, hash).map_err(|e| CredentialError::MalformedHash(e.to_string()))
}

/// Admin credential lifecycle.
///
/// Hashing and verification run on tokio's blocking pool. Once started they
/// run to completion.
pub struct Credentials<S: ?Sized> {
    store: Arc<S>,
    cost: u32,
}

impl<S: ?Sized> Clone for Credentials<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cost: self.cost,
        }
    }
}

impl<S> Credentials<S>
where
    S: Store + ?Sized + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the bcrypt work factor
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Create an administrator and return its one-time password
    pub async fn add_admin(&self, login: &str) -> Result<Secret, CredentialError> {
        let (secret, hash) = self.new_secret().await?;
        let id = self.store.admin_insert(login, &hash).await?;
        info!("Added admin {} (id {})", login, id);
        Ok(secret)
    }

    /// Replace the password of an existing administrator
    pub async fn reset_password(&self, admin_id: i64) -> Result<Secret, CredentialError> {
        let (secret, hash) = self.new_secret().await?;
        self.store.admin_set_password(admin_id, &hash).await?;
        info!("Reset password of admin id {}", admin_id);
        Ok(secret)
    }

    pub async fn remove_admin(&self, admin_id: i64) -> Result<(), CredentialError> {
        self.store.admin_remove(admin_id).await?;
        info!("Removed admin id {}", admin_id);
        Ok(())
    }

    pub async fn admins(&self) -> Result<Vec<Admin>, CredentialError> {
        Ok(self.store.admins_list().await?)
    }

    /// Check a login/password pair.
    ///
    /// Unknown logins and wrong passwords both yield `Ok(false)`. An unknown
    /// login still pays for one bcrypt round at the configured cost, so the
    /// two cases take the same time.
    pub async fn check_password(&self, login: &str, candidate: &str) -> Result<bool, CredentialError> {
        let admin = self.store.admin_by_login(login).await?;
        if admin.is_none() {
            debug!("Login attempt for unknown admin");
        }

        let candidate = candidate.to_string();
        let cost = self.cost;
        let matches = tokio::task::spawn_blocking(move || -> Result<bool, CredentialError> {
            match admin {
                Some(admin) => verify_password(&admin.password_hash, &candidate),
                None => {
                    // Same work as a verify; both truncate past 72 bytes
                    bcrypt::hash(candidate.as_bytes(), cost).map_err(CredentialError::Hash)?;
                    Ok(false)
                }
            }
        })
        .await??;
        Ok(matches)
    }

    async fn new_secret(&self) -> Result<(Secret, Vec<u8>), CredentialError> {
        let cost = self.cost;
        let (secret, hash) = tokio::task::spawn_blocking(move || {
            let secret = generate_password()?;
            let hash = hash_password(secret.expose(), cost)?;
            Ok::<_, CredentialError>((secret, hash))
        })
        .await??;
        Ok((secret, hash))
    }
}
