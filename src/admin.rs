//! Shared-secret admin gate.
//!
//! The stored hash is hex SHA-256 of the password, or HMAC-SHA256 keyed by
//! the salt when one is configured. A successful check flips a flag for the
//! rest of the session; there are no tokens and no expiry.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::logging::log_admin_attempt;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded hash for `ADMIN_PASSWORD_HASH`.
pub fn hash_password(password: &str, salt: Option<&str>) -> String {
    hex::encode(digest(password, salt))
}

fn digest(password: &str, salt: Option<&str>) -> Vec<u8> {
    match salt {
        Some(salt) => {
            // HMAC accepts keys of any length
            let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
                .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
            mac.update(password.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        None => Sha256::digest(password.as_bytes()).to_vec(),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Default)]
pub struct AdminGate {
    stored_hash: Option<Vec<u8>>,
    salt: Option<String>,
    authenticated: bool,
}

impl AdminGate {
    /// A gate without a usable stored hash never authenticates.
    pub fn new(stored_hash_hex: Option<&str>, salt: Option<&str>) -> Self {
        let stored_hash = stored_hash_hex
            .and_then(|h| hex::decode(h.trim().to_ascii_lowercase()).ok())
            .filter(|h| h.len() == 32);
        Self {
            stored_hash,
            salt: salt.map(str::to_string),
            authenticated: false,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.stored_hash.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn verify(&self, password: &str) -> bool {
        match &self.stored_hash {
            Some(stored) => constant_time_eq(&digest(password, self.salt.as_deref()), stored),
            None => false,
        }
    }

    /// Sets the session flag on success. A failed attempt leaves an
    /// already-authenticated session authenticated.
    pub fn login(&mut self, password: &str) -> bool {
        let ok = self.verify(password);
        log_admin_attempt(ok);
        if ok {
            self.authenticated = true;
        }
        ok
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }
}
