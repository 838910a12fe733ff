//! Password hashing and verification.

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::AuthError;

/// Minimum accepted password length at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password using bcrypt.
pub fn hash_password(password: &SecretString, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password.expose_secret(), cost).map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Whether a stored credential is a bcrypt hash.
pub fn is_bcrypt_hash(stored: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| stored.starts_with(prefix))
}

/// Verify a password against a stored credential.
///
/// Non-bcrypt values are legacy plaintext records; they only match when
/// `allow_plaintext` is set.
pub fn verify_password(
    password: &SecretString,
    stored: &str,
    allow_plaintext: bool,
) -> Result<bool, AuthError> {
    if is_bcrypt_hash(stored) {
        return bcrypt::verify(password.expose_secret(), stored)
            .map_err(|e| AuthError::Hashing(e.to_string()));
    }
    if !allow_plaintext {
        warn!("Stored credential is not a bcrypt hash and plaintext login is disabled");
        return Ok(false);
    }
    warn!("Verifying credential with legacy plaintext comparison");
    Ok(password.expose_secret() == stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password(&secret("password123"), 4).unwrap();
        assert!(is_bcrypt_hash(&hash));
        assert!(verify_password(&secret("password123"), &hash, false).unwrap());
        assert!(!verify_password(&secret("wrong"), &hash, false).unwrap());
    }

    #[test]
    fn hash_is_salted() {
        let a = hash_password(&secret("same"), 4).unwrap();
        let b = hash_password(&secret("same"), 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_fallback_requires_opt_in() {
        assert!(!verify_password(&secret("legacy"), "legacy", false).unwrap());
        assert!(verify_password(&secret("legacy"), "legacy", true).unwrap());
        assert!(!verify_password(&secret("other"), "legacy", true).unwrap());
    }

    #[test]
    fn bcrypt_prefix_detection() {
        assert!(is_bcrypt_hash("$2b$04$abcdefghijklmnopqrstuv"));
        assert!(is_bcrypt_hash("$2y$10$abcdefghijklmnopqrstuv"));
        assert!(!is_bcrypt_hash("password123"));
        assert!(!is_bcrypt_hash("$argon2id$v=19$..."));
    }
}
