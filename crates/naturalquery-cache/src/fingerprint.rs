//! Content fingerprints used as cache keys

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `text`
///
/// Identical DDL from two databases yields the same key; the DDL text is the
/// unit being cached, not the database.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
