//! Credential hashing with argon2id.
//!
//! The core stores the PHC-formatted string untouched; swapping the
//! algorithm only means swapping this module.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::AdapterError;

/// Hash a password into a PHC string carrying salt and parameters.
pub fn hash_password(password: &str) -> Result<String, AdapterError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AdapterError::Credentials(format!("hashing failed: {e}")))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AdapterError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AdapterError::Credentials(format!("stored hash is malformed: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_and_rejects_wrong_password() {
        let hash = hash_password("campus-pass-1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("campus-pass-1", &hash).unwrap());
        assert!(!verify_password("campus-pass-2", &hash).unwrap());
    }

    #[test]
    fn same_password_salts_differently() {
        let first = hash_password("repeat").unwrap();
        let second = hash_password("repeat").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("repeat", &second).unwrap());
    }

    #[test]
    fn malformed_stored_hash_errors() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
