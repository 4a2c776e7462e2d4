//! Password hashing with argon2 PHC strings.

use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::{RngCore, rngs::OsRng};

use crate::error::DataAccessError;

/// Hashes `password` with a fresh random salt.
///
/// # Errors
///
/// Returns `DataAccessError::Backend` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, DataAccessError> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| DataAccessError::Backend {
        details: e.to_string(),
    })?;

    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DataAccessError::Backend {
            details: e.to_string(),
        })?
        .to_string();
    Ok(phc)
}

/// Returns true if `password` matches the stored `hash`.
///
/// An unparseable hash never matches.
#[must_use]
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Runs [`hash_password`] on the blocking thread pool.
///
/// # Errors
///
/// Returns `DataAccessError::Backend` if hashing fails or the task dies.
pub async fn hash_password_async(password: &str) -> Result<String, DataAccessError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| DataAccessError::Backend {
            details: e.to_string(),
        })?
}

/// Runs [`verify_password`] on the blocking thread pool.
///
/// # Errors
///
/// Returns `DataAccessError::Backend` if the task dies.
pub async fn verify_password_async(hash: String, password: &str) -> Result<bool, DataAccessError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .map_err(|e| DataAccessError::Backend {
            details: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocking_pool_variants_agree() {
        let hash = hash_password_async("correct-horse").await.expect("hash");
        assert!(
            verify_password_async(hash.clone(), "correct-horse")
                .await
                .expect("verify")
        );
        assert!(!verify_password_async(hash, "wrong-horse").await.expect("verify"));
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("correct-horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct-horse"));
        assert!(!verify_password(&hash, "wrong-horse"));
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("pass").expect("hash");
        let second = hash_password("pass").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
