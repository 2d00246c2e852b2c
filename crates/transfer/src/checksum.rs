use sha2::{Digest, Sha256};

/// Length of the hex digest sent alongside each chunk.
pub const CHECKSUM_HEX_LEN: usize = 32;

/// Fingerprints `data` for server-side corruption checks.
///
/// SHA-256, hex-encoded and truncated to [`CHECKSUM_HEX_LEN`] characters.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(CHECKSUM_HEX_LEN);
    digest
}
