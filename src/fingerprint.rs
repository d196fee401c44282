use sha2::{Digest, Sha256};

/// SHA-256 of the canonical text, lowercase hex. This is the change-detection
/// key: a record whose stored hash matches the current file's canonical text
/// does not need re-embedding.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}
