//! Minimal Ollama generate API client.
//!
//! This crate provides a focused client for a locally hosted model server with:
//! - Non-streaming and streaming completions against `/api/generate`
//! - Buffered newline-delimited JSON decoding for streaming responses
//! - Cumulative text snapshots instead of raw deltas
//!
//! A streaming completion never fails outright. Transport errors collapse into a
//! single [`FALLBACK_TEXT`] snapshot so callers always have something to show.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "gemma2:2b";

/// Text yielded in place of a response when the service cannot be reached.
pub const FALLBACK_TEXT: &str = "Sorry, something went wrong.";

/// Errors that can occur when using the Ollama client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Ollama API client.
#[derive(Clone)]
pub struct Ollama {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl Ollama {
    /// Create a new client talking to the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_http_client(Duration::from_secs(300)),
            base_url: normalize_base_url(&base_url.into()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from `OLLAMA_HOST` and `OLLAMA_MODEL`, falling back to
    /// the local default server and model.
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let client = Self::new(base_url);
        match std::env::var("OLLAMA_MODEL") {
            Ok(model) if !model.trim().is_empty() => client.with_model(model.trim()),
            _ => client,
        }
    }

    /// Set the model used for every request from this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replace the overall request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_http_client(timeout);
        self
    }

    /// The model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The server root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a non-streaming completion request and return the full text.
    pub async fn generate(&self, prompt: impl Into<String>) -> Result<String, Error> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            stream: false,
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let body: GenerateChunk = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(Error::Api {
                status: 200,
                message: error,
            });
        }

        Ok(body.response.unwrap_or_default())
    }

    /// Open a streaming completion.
    ///
    /// Nothing is sent until the returned stream is first polled. Each item is
    /// the full text accumulated so far. The stream ends on a `done` frame or
    /// at the end of the body. A failed request, an error status, or a reply
    /// that ends before any text arrived yields exactly one [`FALLBACK_TEXT`]
    /// item.
    pub fn stream_completion(&self, prompt: impl Into<String>) -> SnapshotStream {
        let client = self.client.clone();
        let url = self.generate_url();
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            stream: true,
        };

        let stream = async_stream::stream! {
            tracing::debug!(model = %request.model, prompt_len = request.prompt.len(), "opening completion stream");

            let response = match client.post(&url).json(&request).send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("completion request failed: {e}");
                    yield FALLBACK_TEXT.to_string();
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status, body = %body, "completion service rejected request");
                yield FALLBACK_TEXT.to_string();
                return;
            }

            let mut decoder = LineDecoder::new();
            let mut yielded = false;
            let mut bytes = response.bytes_stream();

            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for frame in decoder.push(&chunk) {
                            match frame {
                                Frame::Snapshot(text) => {
                                    yielded = true;
                                    yield text;
                                }
                                Frame::Done | Frame::Failed(_) => {
                                    if !yielded {
                                        yield FALLBACK_TEXT.to_string();
                                    }
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("completion stream interrupted: {e}");
                        if !yielded {
                            yield FALLBACK_TEXT.to_string();
                        }
                        return;
                    }
                }
            }

            for frame in decoder.finish() {
                if let Frame::Snapshot(text) = frame {
                    yielded = true;
                    yield text;
                }
            }

            if !yielded {
                tracing::warn!("completion stream ended without any text");
                yield FALLBACK_TEXT.to_string();
            }
        };

        SnapshotStream::new(stream)
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
}

/// `OLLAMA_HOST` is commonly set as a bare `host:port`.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

// ============================================================================
// Snapshot stream
// ============================================================================

/// A lazy, finite, non-restartable sequence of cumulative response snapshots.
///
/// Dropping the stream (or calling [`SnapshotStream::cancel`]) drops the
/// underlying HTTP response and releases the connection.
pub struct SnapshotStream {
    inner: Pin<Box<dyn Stream<Item = String> + Send>>,
}

impl SnapshotStream {
    /// Wrap any stream of snapshots.
    pub fn new(stream: impl Stream<Item = String> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A stream that replays the given snapshots in order.
    pub fn from_snapshots<I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures::stream::iter(snapshots))
    }

    /// Await the next snapshot.
    pub async fn next_snapshot(&mut self) -> Option<String> {
        self.inner.next().await
    }

    /// Stop consuming and release the connection.
    pub fn cancel(self) {
        tracing::debug!("completion stream cancelled");
    }

    /// Drain the stream and return the last snapshot.
    pub async fn final_text(mut self) -> Option<String> {
        let mut last = None;
        while let Some(text) = self.inner.next().await {
            last = Some(text);
        }
        last
    }
}

impl Stream for SnapshotStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for SnapshotStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStream").finish_non_exhaustive()
    }
}

// ============================================================================
// Line decoding
// ============================================================================

/// A decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Full text accumulated so far.
    Snapshot(String),
    /// The service finished generating.
    Done,
    /// The service reported an error in-band. No frames follow.
    Failed(String),
}

/// Incremental decoder for the newline-delimited JSON body.
///
/// Bytes are buffered until a full line is available, so lines (and UTF-8
/// sequences) split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    text: String,
    finished: bool,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the frames completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.decode_line(&line[..newline_pos], &mut frames);
            if self.finished {
                self.buffer.clear();
                break;
            }
        }

        frames
    }

    /// Decode whatever is left once the body has ended.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if !self.finished && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut frames);
        }
        self.finished = true;
        frames
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether a `done` frame has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode_line(&mut self, line: &[u8], frames: &mut Vec<Frame>) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let chunk = match serde_json::from_str::<GenerateChunk>(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("skipping malformed stream line: {e}");
                return;
            }
        };

        if let Some(error) = chunk.error {
            tracing::warn!("completion service reported an error: {error}");
            self.finished = true;
            frames.push(Frame::Failed(error));
            return;
        }

        if let Some(delta) = chunk.response.filter(|delta| !delta.is_empty()) {
            self.text.push_str(&delta);
            frames.push(Frame::Snapshot(self.text.clone()));
        }

        if chunk.done {
            self.finished = true;
            frames.push(Frame::Done);
        }
    }
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}
