//! Scripted in-memory [`UploadApi`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use mediaferry_protocol::{
    ChunkStatus, ChunkUploadResponse, InitUploadRequest, InitUploadResponse,
    SessionStatusResponse, UploadStatus,
};
use mediaferry_transfer::{ReadFuture, TransferError, UploadTarget, chunk_count};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiFuture, BytesSentCallback, ChunkPayload, UploadApi, WholeFilePayload};
use crate::error::UploadError;

type ChunkReply = Result<ChunkUploadResponse, UploadError>;

const SEND_PIECE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ChunkCall {
    pub index: u32,
    pub checksum: String,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct WholeCall {
    pub filename: String,
    pub project_id: Option<String>,
    pub len: usize,
}

#[derive(Default)]
struct Recorded {
    init: Vec<InitUploadRequest>,
    chunks: Vec<ChunkCall>,
    attempts: HashMap<u32, u32>,
    releases: Vec<String>,
    status: Vec<String>,
    whole: Vec<WholeCall>,
}

/// Answers like a well-behaved server unless told otherwise.
///
/// Init responses echo the requested geometry (or a forced chunk size).
/// Per-index chunk scripts are consumed one reply per attempt; once a script
/// is empty the chunk succeeds.
pub struct MockApi {
    session_id: String,
    forced_chunk_size: Option<u64>,
    init_chunk_count: Option<u32>,
    init_error: Option<UploadError>,
    chunk_scripts: Mutex<HashMap<u32, Vec<ChunkReply>>>,
    hang_chunk: Option<u32>,
    cancel_after: Option<(u32, CancellationToken)>,
    release_error: Option<UploadError>,
    status: Option<Result<SessionStatusResponse, UploadError>>,
    whole: Result<serde_json::Value, UploadError>,
    recorded: Mutex<Recorded>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            session_id: "sess-1".into(),
            forced_chunk_size: None,
            init_chunk_count: None,
            init_error: None,
            chunk_scripts: Mutex::new(HashMap::new()),
            hang_chunk: None,
            cancel_after: None,
            release_error: None,
            status: None,
            whole: Ok(serde_json::json!({"status": "ok"})),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// Session id and server-chosen chunk size for init.
    pub fn with_session(mut self, id: &str, chunk_size: u64) -> Self {
        self.session_id = id.into();
        self.forced_chunk_size = Some(chunk_size);
        self
    }

    /// Init reports `count` chunks regardless of the file size.
    pub fn with_init_chunk_count(mut self, count: u32) -> Self {
        self.init_chunk_count = Some(count);
        self
    }

    pub fn fail_init(mut self, err: UploadError) -> Self {
        self.init_error = Some(err);
        self
    }

    pub fn script_chunk(self, index: u32, replies: Vec<ChunkReply>) -> Self {
        self.chunk_scripts.lock().unwrap().insert(index, replies);
        self
    }

    /// Chunk `index` never answers.
    pub fn hang_chunk(mut self, index: u32) -> Self {
        self.hang_chunk = Some(index);
        self
    }

    /// Fires `token` while chunk `index` is being acknowledged.
    pub fn cancel_after_chunk(mut self, index: u32, token: CancellationToken) -> Self {
        self.cancel_after = Some((index, token));
        self
    }

    pub fn fail_release(mut self, err: UploadError) -> Self {
        self.release_error = Some(err);
        self
    }

    pub fn with_status(mut self, status: SessionStatusResponse) -> Self {
        self.status = Some(Ok(status));
        self
    }

    pub fn fail_status(mut self, err: UploadError) -> Self {
        self.status = Some(Err(err));
        self
    }

    pub fn with_whole_response(mut self, v: serde_json::Value) -> Self {
        self.whole = Ok(v);
        self
    }

    pub fn fail_whole(mut self, err: UploadError) -> Self {
        self.whole = Err(err);
        self
    }

    pub fn retry_required() -> ChunkUploadResponse {
        ChunkUploadResponse {
            status: ChunkStatus::RetryRequired,
            retry_count: Some(1),
            max_retries: Some(3),
        }
    }

    pub fn init_requests(&self) -> Vec<InitUploadRequest> {
        self.recorded.lock().unwrap().init.clone()
    }

    /// Every chunk attempt, in order.
    pub fn chunk_calls(&self) -> Vec<ChunkCall> {
        self.recorded.lock().unwrap().chunks.clone()
    }

    pub fn attempts_for(&self, index: u32) -> u32 {
        self.recorded
            .lock()
            .unwrap()
            .attempts
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    pub fn releases(&self) -> Vec<String> {
        self.recorded.lock().unwrap().releases.clone()
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.recorded.lock().unwrap().status.clone()
    }

    pub fn whole_calls(&self) -> Vec<WholeCall> {
        self.recorded.lock().unwrap().whole.clone()
    }
}

impl UploadApi for MockApi {
    fn init_session(&self, req: InitUploadRequest) -> ApiFuture<'_, InitUploadResponse> {
        Box::pin(async move {
            self.recorded.lock().unwrap().init.push(req.clone());
            if let Some(err) = &self.init_error {
                return Err(err.clone());
            }
            let chunk_size = self.forced_chunk_size.unwrap_or(req.chunk_size);
            Ok(InitUploadResponse {
                upload_session_id: self.session_id.clone(),
                total_chunks: self
                    .init_chunk_count
                    .unwrap_or(chunk_count(req.file_size, chunk_size) as u32),
                chunk_size,
                expires_at: "2099-01-01T00:00:00Z".into(),
                upload_url: format!("/upload/chunk/{}", self.session_id),
            })
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        _session_id: &'a str,
        chunk: ChunkPayload,
    ) -> ApiFuture<'a, ChunkUploadResponse> {
        Box::pin(async move {
            {
                let mut rec = self.recorded.lock().unwrap();
                rec.chunks.push(ChunkCall {
                    index: chunk.index,
                    checksum: chunk.checksum.clone(),
                    len: chunk.data.len(),
                });
                *rec.attempts.entry(chunk.index).or_default() += 1;
            }
            if self.hang_chunk == Some(chunk.index) {
                std::future::pending::<()>().await;
            }
            let scripted = {
                let mut scripts = self.chunk_scripts.lock().unwrap();
                scripts
                    .get_mut(&chunk.index)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.remove(0))
            };
            if let Some((index, token)) = &self.cancel_after {
                if *index == chunk.index {
                    token.cancel();
                }
            }
            scripted.unwrap_or(Ok(ChunkUploadResponse {
                status: ChunkStatus::Success,
                retry_count: None,
                max_retries: None,
            }))
        })
    }

    fn release_session<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.recorded
                .lock()
                .unwrap()
                .releases
                .push(session_id.to_string());
            match &self.release_error {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        })
    }

    fn session_status<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, SessionStatusResponse> {
        Box::pin(async move {
            self.recorded
                .lock()
                .unwrap()
                .status
                .push(session_id.to_string());
            match &self.status {
                Some(result) => result.clone(),
                None => Err(UploadError::http(404, "unknown session")),
            }
        })
    }

    fn upload_whole(
        &self,
        payload: WholeFilePayload,
        on_sent: BytesSentCallback,
    ) -> ApiFuture<'_, serde_json::Value> {
        Box::pin(async move {
            self.recorded.lock().unwrap().whole.push(WholeCall {
                filename: payload.filename.clone(),
                project_id: payload.project_id.clone(),
                len: payload.data.len(),
            });
            if self.whole.is_ok() {
                for piece in payload.data.chunks(SEND_PIECE) {
                    on_sent(piece.len() as u64);
                }
            }
            self.whole.clone()
        })
    }
}

/// A target of `size` zero bytes that never materialises the whole file.
pub struct ZeroTarget {
    name: String,
    size: u64,
}

impl ZeroTarget {
    pub fn new(name: &str, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

impl UploadTarget for ZeroTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&self, start: u64, end: u64) -> ReadFuture<'_> {
        Box::pin(async move {
            if start > end || end > self.size {
                return Err(TransferError::RangeOutOfBounds {
                    start,
                    end,
                    size: self.size,
                });
            }
            Ok(Bytes::from(vec![0u8; (end - start) as usize]))
        })
    }
}

/// Status reply for a session that is still missing `missing`.
pub fn pending_status(missing: Vec<u32>) -> SessionStatusResponse {
    SessionStatusResponse {
        status: UploadStatus::Uploading.into(),
        missing_chunks: missing,
        chunk_size: None,
        total_chunks: None,
        expires_at: None,
    }
}
