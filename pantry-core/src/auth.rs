//! Request-signing primitives shared by the upload client and the server.
//!
//! A signed request carries four headers: the client identity, the SHA-256 of
//! the body, the signer's public key, and a signature over
//! [`canonical_request`].

use sha2::{Digest, Sha256};

pub const HEADER_USER_ID: &str = "x-ops-userid";
pub const HEADER_CONTENT_HASH: &str = "x-ops-content-hash";
pub const HEADER_PUBLIC_KEY: &str = "x-ops-public-key";
pub const HEADER_SIGNATURE: &str = "x-ops-signature";

/// Lowercase hex SHA-256 of `body`.
pub fn content_hash(body: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(body);
    hex::encode(h.finalize())
}

/// The byte string a client signs and a server verifies.
pub fn canonical_request(method: &str, path: &str, content_hash: &str) -> String {
    format!("{}\n{}\n{}", method.to_ascii_uppercase(), path, content_hash)
}
