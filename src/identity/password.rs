//! Salted SHA-256 credential digests stored as `<hex salt>$<hex digest>`.

use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

const SALT_BYTES: usize = 16;
const DELIMITER: char = '$';

fn digest_hex(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash `secret` under a fresh random salt.
pub fn hash_password(secret: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; SALT_BYTES];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal("entropy", e.to_string()))?;
    let salt = hex::encode(salt_bytes);
    let digest = digest_hex(&salt, secret);
    Ok(format!("{salt}{DELIMITER}{digest}"))
}

/// Check `secret` against a stored value. Malformed stored values never verify.
pub fn verify_password(secret: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once(DELIMITER) else { return false; };
    if salt.is_empty() || expected.is_empty() || expected.contains(DELIMITER) {
        return false;
    }
    let computed = digest_hex(salt, secret);
    constant_time_eq(computed.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() { return false; }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        for secret in ["T123", "", "R1", "pässwörd with spaces"] {
            let stored = hash_password(secret).unwrap();
            assert!(verify_password(secret, &stored), "secret {:?} should verify", secret);
        }
    }

    #[test]
    fn different_secret_does_not_verify() {
        let stored = hash_password("R1").unwrap();
        assert!(!verify_password("R2", &stored));
        assert!(!verify_password("r1", &stored));
    }

    #[test]
    fn salt_is_fresh_and_hex() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
        let (salt, digest) = a.split_once('$').unwrap();
        assert_eq!(salt.len(), SALT_BYTES * 2);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn malformed_values_fail_closed() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "no-delimiter"));
        assert!(!verify_password("x", "$abc"));
        assert!(!verify_password("x", "abc$"));
        assert!(!verify_password("x", "a$b$c"));
    }
}
