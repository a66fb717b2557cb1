//! Idempotency key derivation and format checks.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Length of a derived key, in hex characters.
const DERIVED_KEY_LEN: usize = 32;

fn uuid_v4_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
            .expect("uuid v4 pattern is valid")
    })
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{16,64}$").expect("token pattern is valid"))
}

/// Derive a stable key from caller data (typically a transaction ID).
///
/// The same input always yields the same 32-char lowercase hex key.
pub fn generate_idempotency_key(data: &str) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(DERIVED_KEY_LEN);
    key
}

/// Accepts a UUID v4 or 16-64 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_idempotency_key(key: &str) -> bool {
    uuid_v4_pattern().is_match(key) || token_pattern().is_match(key)
}
