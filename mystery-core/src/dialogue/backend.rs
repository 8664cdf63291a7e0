//! The seam between dialogue orchestration and the model server.

use ollama::{Ollama, SnapshotStream};

/// Something that can turn a prompt into a stream of cumulative snapshots.
///
/// Implementations must not fail: transport problems are expressed as a
/// fallback snapshot inside the stream.
pub trait CompletionBackend: Send + Sync {
    fn stream_completion(&self, prompt: &str) -> SnapshotStream;
}

impl CompletionBackend for Ollama {
    fn stream_completion(&self, prompt: &str) -> SnapshotStream {
        Ollama::stream_completion(self, prompt)
    }
}
