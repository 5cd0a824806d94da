//! Salted password hashes.
//!
//! `hash = hex(sha256(password ++ salt))` with a fresh UUIDv4 (simple hex)
//! salt per password, compatible with existing user databases.

use sha2::{Digest, Sha256};

/// A fresh random salt.
pub fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Lowercase hex SHA-256 of `password ++ salt`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recompute and compare.
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt).eq_ignore_ascii_case(expected_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // sha256("password" ++ "salt")
        assert_eq!(
            hash_password("password", "salt"),
            "7a37b85c8918eac19a9089c0fa5a2ab4dce3f90528dcdeec108b23ddf3607b99"
        );
    }

    #[test]
    fn salts_are_unique_hex() {
        let a = new_salt();
        let b = new_salt();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn verify_round_trip() {
        let salt = new_salt();
        let hash = hash_password("hunter2", &salt);
        assert!(verify_password("hunter2", &salt, &hash));
        assert!(!verify_password("hunter3", &salt, &hash));
    }
}
