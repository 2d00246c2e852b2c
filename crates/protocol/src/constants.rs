//! Endpoint paths and multipart field names.

/// Session negotiation endpoint.
pub const INIT_PATH: &str = "/upload/init";

/// Single-request upload endpoint for files below the chunking threshold.
pub const TRADITIONAL_PATH: &str = "/upload/traditional";

/// Multipart field carrying the chunk index.
pub const FIELD_CHUNK_INDEX: &str = "chunk_index";
/// Multipart field carrying the chunk checksum.
pub const FIELD_CHECKSUM: &str = "checksum";
/// Multipart field carrying the chunk bytes.
pub const FIELD_CHUNK: &str = "chunk";
/// Multipart field carrying the whole file on the single-request path.
pub const FIELD_FILE: &str = "file";
/// Optional multipart field naming the owning project.
pub const FIELD_PROJECT_ID: &str = "project_id";

/// `POST` target for a single chunk of `session_id`.
pub fn chunk_path(session_id: &str) -> String {
    format!("/upload/chunk/{session_id}")
}

/// `DELETE` target releasing `session_id`.
pub fn session_path(session_id: &str) -> String {
    format!("/upload/{session_id}")
}

/// `GET` target reporting which chunks of `session_id` are still missing.
pub fn status_path(session_id: &str) -> String {
    format!("/upload/status/{session_id}")
}
