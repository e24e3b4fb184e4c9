//! Request key generation.
//!
//! A request key identifies one cached response: the method plus the
//! normalized URL (query included). The readable form is hashed so the
//! primary key has a fixed width regardless of URL length.

use sha2::{Digest, Sha256};

/// Readable request key, e.g. `GET https://example.com/a?b=1`.
pub fn request_key(method: &str, url: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), url)
}

/// Compute the stored request key hash for a method and normalized URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request_key(method, url).as_bytes());
    hex::encode(hasher.finalize())
}
