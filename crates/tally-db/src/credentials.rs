//! # Credentials
//!
//! Password hashing and one-time tokens.
//!
//! ```text
//! password ──argon2 (random salt)──► PHC string ──► users.password_hash
//!
//! token (32 random bytes, hex) ──► emailed to the user
//!    └──sha256──► users.verification_token_hash / users.reset_token_hash
//! ```
//!
//! Only digests are stored, so a leaked database cannot be replayed against
//! the verify or reset endpoints.

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sha2::{Digest, Sha256};

use crate::error::{DbError, DbResult};

/// Hashes a password with argon2 and a fresh salt.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Spends one argon2 verification on a throwaway hash and reports no match.
///
/// Login calls this for unknown accounts so they take as long to reject as a
/// wrong password on a real one.
pub fn verify_against_dummy(password: &str) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    if let Some(hash) = DUMMY_HASH.get_or_init(|| hash_password("not a real account").ok()) {
        let _ = verify_password(password, hash);
    }
    false
}

/// Generates a URL-safe one-time token (64 hex chars).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Digest stored in place of a one-time token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
