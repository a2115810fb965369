//! Entity tag computation for stored chunks.

use sha2::{Digest, Sha256};

/// Compute the entity tag for a chunk body: lowercase hex SHA-256.
///
/// Clients echo this tag when resuming a transfer; equality of tags is the
/// only contract, the hash choice is an implementation detail.
pub fn compute(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
