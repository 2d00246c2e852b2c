//! reqwest implementation of [`UploadApi`].

use std::time::Duration;

use bytes::Bytes;
use mediaferry_protocol::constants::{
    FIELD_CHECKSUM, FIELD_CHUNK, FIELD_CHUNK_INDEX, FIELD_FILE, FIELD_PROJECT_ID, INIT_PATH,
    TRADITIONAL_PATH, chunk_path, session_path, status_path,
};
use mediaferry_protocol::{
    ChunkUploadResponse, InitUploadRequest, InitUploadResponse, SessionStatusResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::{ApiFuture, BytesSentCallback, ChunkPayload, UploadApi, WholeFilePayload};
use crate::error::UploadError;

/// Size of the body pieces handed to the transport on the single-request
/// path; each one produces a progress tick.
const SEND_PIECE: usize = 64 * 1024;

/// Longest server body quoted in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Upload server client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUploadApi {
    http: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl HttpUploadApi {
    /// Creates a client for `base_url`, e.g. `https://media.example.com/api`.
    ///
    /// `timeout` bounds every individual request.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| UploadError::network(format!("building HTTP client: {e}")))?;
        Ok(Self::with_client(http, base_url, timeout))
    }

    /// Wraps an already configured `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, UploadError> {
        let req = match self.timeout {
            Some(t) => req.timeout(t),
            None => req,
        };
        let resp = req.send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UploadError::http(status.as_u16(), truncate(body.trim())));
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, UploadError> {
        let resp = self.send(req).await?;
        let body = resp.bytes().await.map_err(classify)?;
        serde_json::from_slice(&body)
            .map_err(|e| UploadError::invalid_response(format!("malformed server reply: {e}")))
    }
}

impl UploadApi for HttpUploadApi {
    fn init_session(&self, req: InitUploadRequest) -> ApiFuture<'_, InitUploadResponse> {
        Box::pin(async move {
            self.send_json(self.http.post(self.url(INIT_PATH)).json(&req))
                .await
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        session_id: &'a str,
        chunk: ChunkPayload,
    ) -> ApiFuture<'a, ChunkUploadResponse> {
        Box::pin(async move {
            let len = chunk.data.len() as u64;
            let form = Form::new()
                .text(FIELD_CHUNK_INDEX, chunk.index.to_string())
                .text(FIELD_CHECKSUM, chunk.checksum)
                .part(
                    FIELD_CHUNK,
                    Part::stream_with_length(chunk.data, len).file_name(FIELD_CHUNK),
                );
            self.send_json(self.http.post(self.url(&chunk_path(session_id))).multipart(form))
                .await
        })
    }

    fn release_session<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            match self
                .send(self.http.delete(self.url(&session_path(session_id))))
                .await
            {
                Ok(_) => Ok(()),
                Err(e) if e.status_code == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(()),
                Err(e) => Err(e),
            }
        })
    }

    fn session_status<'a>(&'a self, session_id: &'a str) -> ApiFuture<'a, SessionStatusResponse> {
        Box::pin(async move {
            self.send_json(self.http.get(self.url(&status_path(session_id))))
                .await
        })
    }

    fn upload_whole(
        &self,
        payload: WholeFilePayload,
        on_sent: BytesSentCallback,
    ) -> ApiFuture<'_, serde_json::Value> {
        Box::pin(async move {
            let len = payload.data.len() as u64;
            let body = reqwest::Body::wrap_stream(progress_stream(payload.data, on_sent));
            let mut form = Form::new().part(
                FIELD_FILE,
                Part::stream_with_length(body, len).file_name(payload.filename),
            );
            if let Some(project_id) = payload.project_id {
                form = form.text(FIELD_PROJECT_ID, project_id);
            }
            self.send_json(self.http.post(self.url(TRADITIONAL_PATH)).multipart(form))
                .await
        })
    }
}

/// Splits `data` into [`SEND_PIECE`] slices and reports each one as the
/// transport pulls it.
fn progress_stream(
    data: Bytes,
    on_sent: BytesSentCallback,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send + Sync + 'static {
    let pieces: Vec<Bytes> = (0..data.len())
        .step_by(SEND_PIECE)
        .map(|start| data.slice(start..(start + SEND_PIECE).min(data.len())))
        .collect();
    futures_util::stream::iter(pieces.into_iter().map(move |piece| {
        on_sent(piece.len() as u64);
        Ok(piece)
    }))
}

/// Maps a transport failure onto the error taxonomy.
fn classify(err: reqwest::Error) -> UploadError {
    if err.is_timeout() {
        UploadError::timeout(err.to_string())
    } else if let Some(status) = err.status() {
        UploadError::http(status.as_u16(), "")
    } else if err.is_decode() {
        UploadError::invalid_response(err.to_string())
    } else {
        UploadError::network(err.to_string())
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
