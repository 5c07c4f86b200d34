use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::domain::{BankingError, BankingResult};

/// Hash an access code for storage.
pub fn hash_access_code(access_code: &str) -> BankingResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(access_code.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| BankingError::transient(format!("access code hashing failed: {}", e)))
}

/// Check an access code against a stored hash.
///
/// A malformed stored hash is treated as a mismatch rather than surfaced,
/// so a corrupted record cannot be told apart from a wrong code.
pub fn verify_access_code(access_code: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(access_code.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_access_code("2468").unwrap();
        assert_ne!(hash, "2468");
        assert!(verify_access_code("2468", &hash));
        assert!(!verify_access_code("1357", &hash));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_access_code("2468", "not-a-phc-string"));
    }
}
