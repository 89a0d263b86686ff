//! Password hash verification.

use std::future::Future;

use argon2::password_hash::SaltString;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, Version,
};
use rand::Rng;

use crate::SessionError;

/// Checks a plaintext password against a stored hash.
///
/// Returns `Ok(false)` for a plain mismatch and `Err` only when the hash
/// itself cannot be used. The comparison must be constant time.
pub trait PasswordVerifier: Send + Sync + 'static {
    fn verify(
        &self,
        password: &str,
        stored_hash: &str,
    ) -> impl Future<Output = Result<bool, SessionError>> + Send;
}

/// Verifies Argon2 PHC strings (`$argon2id$v=19$m=...`).
///
/// The cost parameters used for verification come from the stored hash.
/// The ones configured here only apply to [`hash_password`](Self::hash_password).
/// Hashing runs on Tokio's blocking pool so it never stalls a worker.
#[derive(Clone)]
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    /// Argon2id with the crate's default cost parameters.
    pub fn new() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }

    /// Argon2id with custom cost parameters.
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hashes a password with a fresh random salt, producing a PHC
    /// string suitable for the `users.password_hash` column.
    pub fn hash_password(&self, password: &str) -> Result<String, SessionError> {
        let bytes: [u8; 16] = rand::rng().random();
        let salt = SaltString::encode_b64(&bytes)
            .map_err(|e| SessionError::Verification(e.to_string()))?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| SessionError::Verification(e.to_string()))?;
        Ok(hash.to_string())
    }
}

impl Default for Argon2Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordVerifier for Argon2Verifier {
    async fn verify(
        &self,
        password: &str,
        stored_hash: &str,
    ) -> Result<bool, SessionError> {
        let argon2 = self.argon2.clone();
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();

        tokio::task::spawn_blocking(move || {
            use argon2::PasswordVerifier as _;

            let parsed = PasswordHash::new(&stored_hash)
                .map_err(|e| SessionError::Verification(e.to_string()))?;
            match argon2.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(SessionError::Verification(e.to_string())),
            }
        })
        .await
        .map_err(|e| SessionError::Verification(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Verifier {
        Argon2Verifier::with_params(Params::new(256, 1, 1, None).unwrap())
    }

    #[tokio::test]
    async fn test_verify_matching_password_returns_true() {
        let verifier = cheap();
        let hash = verifier.hash_password("hunter2").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verifier.verify("hunter2", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_wrong_password_returns_false() {
        let verifier = cheap();
        let hash = verifier.hash_password("hunter2").unwrap();

        assert!(!verifier.verify("hunter3", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_uses_params_from_stored_hash() {
        let hash = cheap().hash_password("hunter2").unwrap();
        assert!(Argon2Verifier::new().verify("hunter2", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_garbage_hash_returns_error() {
        let err = cheap().verify("hunter2", "not-a-phc-string").await.unwrap_err();
        assert!(matches!(err, SessionError::Verification(_)));
    }

    #[test]
    fn test_hash_password_salts_each_hash() {
        let verifier = cheap();
        assert_ne!(
            verifier.hash_password("same").unwrap(),
            verifier.hash_password("same").unwrap()
        );
    }
}
