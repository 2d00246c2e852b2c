use bytes::Bytes;

use crate::TransferError;
use crate::checksum::checksum_bytes;
use crate::target::UploadTarget;

/// One contiguous byte range of the upload target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: u32,
    /// Inclusive start offset.
    pub byte_start: u64,
    /// Exclusive end offset, clamped to the target size.
    pub byte_end: u64,
    /// Hex digest of the bytes (see [`checksum_bytes`]); empty until read.
    pub checksum: String,
}

impl ChunkDescriptor {
    /// Length of this chunk in bytes.
    pub fn len(&self) -> u64 {
        self.byte_end - self.byte_start
    }

    pub fn is_empty(&self) -> bool {
        self.byte_end == self.byte_start
    }
}

/// Number of chunks needed to cover `total_bytes`: `ceil(total / chunk)`.
///
/// Returns 0 for an empty target or a zero chunk size.
pub fn chunk_count(total_bytes: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    total_bytes.div_ceil(chunk_size)
}

/// Byte range `[start, end)` of chunk `index`, or `None` when the index lies
/// past the end of the target.
pub fn chunk_range(index: u32, chunk_size: u64, total_bytes: u64) -> Option<(u64, u64)> {
    let start = u64::from(index).checked_mul(chunk_size)?;
    if chunk_size == 0 || start >= total_bytes {
        return None;
    }
    let end = start.saturating_add(chunk_size).min(total_bytes);
    Some((start, end))
}

/// Every chunk of a `total_bytes` target in ascending order, without checksums.
pub fn plan_chunks(total_bytes: u64, chunk_size: u64) -> impl Iterator<Item = ChunkDescriptor> {
    let count = chunk_count(total_bytes, chunk_size);
    (0..count).filter_map(move |i| {
        let index = u32::try_from(i).ok()?;
        let (byte_start, byte_end) = chunk_range(index, chunk_size, total_bytes)?;
        Some(ChunkDescriptor {
            index,
            byte_start,
            byte_end,
            checksum: String::new(),
        })
    })
}

/// Slices chunk `index` out of `target` and fingerprints it.
pub async fn read_chunk(
    target: &dyn UploadTarget,
    index: u32,
    chunk_size: u64,
) -> Result<(ChunkDescriptor, Bytes), TransferError> {
    let size = target.size();
    let (byte_start, byte_end) =
        chunk_range(index, chunk_size, size).ok_or(TransferError::RangeOutOfBounds {
            start: u64::from(index).saturating_mul(chunk_size),
            end: u64::from(index).saturating_add(1).saturating_mul(chunk_size),
            size,
        })?;
    let data = target.read_range(byte_start, byte_end).await?;
    let descriptor = ChunkDescriptor {
        index,
        byte_start,
        byte_end,
        checksum: checksum_bytes(&data),
    };
    Ok((descriptor, data))
}
