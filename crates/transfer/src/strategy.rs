/// How a file crosses the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Session + ordered chunks with per-chunk retry.
    Chunked,
    /// One multipart request, no retry.
    Traditional,
}

/// Picks the transfer path for a file of `file_size` bytes.
///
/// Chunked iff chunking is enabled and the size reaches `threshold`; the
/// threshold value itself is chunked. The threshold is a policy constant and
/// independent of the chunk size.
pub fn select_strategy(file_size: u64, chunking_enabled: bool, threshold: u64) -> Strategy {
    if chunking_enabled && file_size >= threshold {
        Strategy::Chunked
    } else {
        Strategy::Traditional
    }
}
