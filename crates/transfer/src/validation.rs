use std::path::Path;

use crate::TransferError;

/// Media container extensions accepted when the caller does not supply a list.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "m4v", "wmv", "flv", "mpeg", "mpg",
];

/// Pre-flight checks run before any request is sent.
///
/// Rejects, in order:
/// - a missing file name
/// - an empty file
/// - a file larger than `max_file_size`
/// - an extension outside `allowed_extensions` (case-insensitive, leading
///   dots ignored; an empty list accepts everything)
pub fn validate_upload_file(
    name: &str,
    size: u64,
    max_file_size: u64,
    allowed_extensions: &[String],
) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidFile("missing file name".into()));
    }

    if size == 0 {
        return Err(TransferError::EmptyFile);
    }

    if size > max_file_size {
        return Err(TransferError::FileTooLarge {
            size,
            max: max_file_size,
        });
    }

    if allowed_extensions.is_empty() {
        return Ok(());
    }

    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let allowed = allowed_extensions
        .iter()
        .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext));
    if ext.is_empty() || !allowed {
        return Err(TransferError::UnsupportedFileType(if ext.is_empty() {
            name.to_string()
        } else {
            format!(".{ext}")
        }));
    }

    Ok(())
}
