//! Store PIN: argon2 hashing and verification.
//!
//! The PIN guards supervisor actions at the register (deletes, wholesale
//! pricing, selling inactive products, demo/production switches). Access is
//! denied by default: a gated action fails when the PIN is missing, wrong, or
//! the store never configured one.
//!
//! Guesses are counted per store in [`PinAttempts`], whichever route they
//! arrive on. After [`MAX_PIN_ATTEMPTS`] misses the store is locked out of
//! PIN checks until [`PIN_LOCKOUT`] passes without another attempt.

use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use moka::future::Cache;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use counterline_core::StoreId;

use crate::db::{RepositoryError, StoreRepository};

/// Shortest accepted PIN.
pub const MIN_PIN_DIGITS: usize = 4;
/// Longest accepted PIN.
pub const MAX_PIN_DIGITS: usize = 8;
/// Consecutive wrong PINs a store may send before it is locked out.
pub const MAX_PIN_ATTEMPTS: u32 = 5;
/// How long a locked-out store waits after its last attempt.
pub const PIN_LOCKOUT: Duration = Duration::from_secs(15 * 60);

/// Errors from PIN checks.
#[derive(Debug, Error)]
pub enum PinError {
    #[error("PIN must be 4 to 8 digits")]
    InvalidFormat,

    #[error("this action requires the store PIN")]
    Missing,

    #[error("incorrect PIN")]
    Incorrect,

    #[error("no PIN is configured for this store")]
    NotConfigured,

    #[error("the current PIN is required to change it")]
    CurrentPinRequired,

    #[error("too many incorrect PIN attempts; try again later")]
    TooManyAttempts,

    #[error("PIN hashing error")]
    Hash,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Check the PIN shape: 4 to 8 ASCII digits.
///
/// # Errors
///
/// Returns `PinError::InvalidFormat` otherwise.
pub fn validate_pin_format(pin: &str) -> Result<(), PinError> {
    let len = pin.len();
    if (MIN_PIN_DIGITS..=MAX_PIN_DIGITS).contains(&len) && pin.bytes().all(|b| b.is_ascii_digit())
    {
        Ok(())
    } else {
        Err(PinError::InvalidFormat)
    }
}

/// Hash a PIN with Argon2id.
///
/// # Errors
///
/// Returns `PinError::Hash` if hashing fails.
pub fn hash_pin(pin: &str) -> Result<String, PinError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PinError::Hash)
}

/// Verify a PIN against a stored hash.
///
/// # Errors
///
/// Returns `PinError::Incorrect` on mismatch or an unreadable hash.
pub fn verify_pin(pin: &str, hash: &str) -> Result<(), PinError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PinError::Incorrect)?;
    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .map_err(|_| PinError::Incorrect)
}

/// Unconfirmed PIN attempts per store.
///
/// An attempt is reserved before the hash is compared and cleared when the
/// PIN matches, so parallel guesses cannot all slip in under the limit.
#[derive(Clone)]
pub struct PinAttempts {
    counts: Cache<StoreId, u32>,
    max_attempts: u32,
}

impl PinAttempts {
    /// Allow `max_attempts` misses; counts are forgotten `lockout` after the
    /// last attempt.
    #[must_use]
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            counts: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(lockout)
                .build(),
            max_attempts,
        }
    }

    /// Reserve one attempt for `store_id`.
    ///
    /// # Errors
    ///
    /// Returns `PinError::TooManyAttempts` once the store is locked out.
    pub async fn reserve(&self, store_id: StoreId) -> Result<(), PinError> {
        let entry = self
            .counts
            .entry(store_id)
            .and_upsert_with(|existing| async move {
                existing.map_or(1, |e| e.into_value().saturating_add(1))
            })
            .await;
        if entry.into_value() > self.max_attempts {
            tracing::warn!(store_id = %store_id, "PIN attempts exhausted");
            return Err(PinError::TooManyAttempts);
        }
        Ok(())
    }

    /// Forget the store's attempts after a correct PIN.
    pub async fn clear(&self, store_id: StoreId) {
        self.counts.invalidate(&store_id).await;
    }
}

impl Default for PinAttempts {
    fn default() -> Self {
        Self::new(MAX_PIN_ATTEMPTS, PIN_LOCKOUT)
    }
}

/// Replace the PIN without checking the current one (CLI recovery path).
///
/// # Errors
///
/// Returns `InvalidFormat` or a repository error.
pub async fn reset_pin(pool: &PgPool, store_id: StoreId, new_pin: &str) -> Result<(), PinError> {
    validate_pin_format(new_pin)?;
    let hash = hash_pin(new_pin)?;
    StoreRepository::new(pool).set_pin_hash(store_id, &hash).await?;
    Ok(())
}

/// PIN operations for one store.
pub struct PinService<'a> {
    stores: StoreRepository<'a>,
    attempts: &'a PinAttempts,
}

impl<'a> PinService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, attempts: &'a PinAttempts) -> Self {
        Self {
            stores: StoreRepository::new(pool),
            attempts,
        }
    }

    /// Compare a PIN against the stored hash, counting the attempt.
    async fn check(&self, store_id: StoreId, pin: &str, hash: &str) -> Result<(), PinError> {
        self.attempts.reserve(store_id).await?;
        verify_pin(pin, hash)?;
        self.attempts.clear(store_id).await;
        Ok(())
    }

    /// Verify a PIN supplied with a request.
    ///
    /// # Errors
    ///
    /// Returns `Missing`, `NotConfigured`, `Incorrect` or `TooManyAttempts`
    /// when access is denied.
    #[instrument(skip(self, pin))]
    pub async fn verify(&self, store_id: StoreId, pin: Option<&str>) -> Result<(), PinError> {
        let pin = pin.filter(|p| !p.is_empty()).ok_or(PinError::Missing)?;
        self.attempts.reserve(store_id).await?;
        let hash = self
            .stores
            .pin_hash(store_id)
            .await?
            .ok_or(PinError::NotConfigured)?;
        let result = verify_pin(pin, &hash);
        match result {
            Ok(()) => self.attempts.clear(store_id).await,
            Err(_) => tracing::warn!(store_id = %store_id, "PIN verification failed"),
        }
        result
    }

    /// Set or change the PIN.
    ///
    /// The first PIN can be set freely; replacing one needs the current PIN.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat`, `CurrentPinRequired` or `Incorrect`.
    #[instrument(skip(self, current, new_pin))]
    pub async fn set(
        &self,
        store_id: StoreId,
        current: Option<&str>,
        new_pin: &str,
    ) -> Result<(), PinError> {
        validate_pin_format(new_pin)?;
        if let Some(existing) = self.stores.pin_hash(store_id).await? {
            let current = current
                .filter(|p| !p.is_empty())
                .ok_or(PinError::CurrentPinRequired)?;
            self.check(store_id, current, &existing).await?;
        }
        let hash = hash_pin(new_pin)?;
        self.stores.set_pin_hash(store_id, &hash).await?;
        tracing::info!(store_id = %store_id, "Store PIN updated");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_format() {
        assert!(validate_pin_format("1234").is_ok());
        assert!(validate_pin_format("12345678").is_ok());
        assert!(matches!(validate_pin_format("123"), Err(PinError::InvalidFormat)));
        assert!(matches!(validate_pin_format("123456789"), Err(PinError::InvalidFormat)));
        assert!(matches!(validate_pin_format("12a4"), Err(PinError::InvalidFormat)));
        assert!(matches!(validate_pin_format("١٢٣٤"), Err(PinError::InvalidFormat)));
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_pin("4321").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_pin("4321", &hash).is_ok());
        assert!(matches!(verify_pin("1234", &hash), Err(PinError::Incorrect)));
    }

    #[test]
    fn test_garbage_hash_is_incorrect() {
        assert!(matches!(verify_pin("1234", "not-a-hash"), Err(PinError::Incorrect)));
    }

    #[tokio::test]
    async fn test_store_locked_after_max_attempts() {
        let attempts = PinAttempts::default();
        let store = StoreId::new(1);

        for _ in 0..MAX_PIN_ATTEMPTS {
            attempts.reserve(store).await.unwrap();
        }
        assert!(matches!(
            attempts.reserve(store).await,
            Err(PinError::TooManyAttempts)
        ));

        // Other stores keep their own count
        attempts.reserve(StoreId::new(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_correct_pin_clears_attempts() {
        let attempts = PinAttempts::new(2, PIN_LOCKOUT);
        let store = StoreId::new(1);

        attempts.reserve(store).await.unwrap();
        attempts.reserve(store).await.unwrap();
        attempts.clear(store).await;

        attempts.reserve(store).await.unwrap();
        attempts.reserve(store).await.unwrap();
        assert!(attempts.reserve(store).await.is_err());
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let attempts = PinAttempts::new(1, Duration::from_millis(50));
        let store = StoreId::new(1);

        attempts.reserve(store).await.unwrap();
        assert!(attempts.reserve(store).await.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        attempts.reserve(store).await.unwrap();
    }
}
