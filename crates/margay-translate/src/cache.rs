//! Content-addressed on-disk cache for translation responses.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunk::ConversionChunk;

/// One translator answer for one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub success: bool,
    pub converted_code: String,
    pub explanation: String,
    pub warnings: Vec<String>,
    pub tokens_used: u64,
    pub processing_time: f64,
}

impl TranslationResponse {
    pub fn failure(explanation: impl Into<String>, processing_time: f64) -> Self {
        TranslationResponse {
            success: false,
            converted_code: String::new(),
            explanation: explanation.into(),
            warnings: Vec::new(),
            tokens_used: 0,
            processing_time,
        }
    }
}

/// Cache key: chunk kind, chunk id, and a SHA-256 digest over everything
/// that shapes the prompt (the chunk content plus any prior-conversion
/// context).
///
/// Two chunks with identical kind, id, content, and context always share a
/// key, so concurrent writers produce identical bytes and replays are
/// exact; a prompt carrying different context never replays a stale answer.
pub fn cache_key(chunk: &ConversionChunk, context: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.content.as_bytes());
    if !context.is_empty() {
        hasher.update(b"\n--context--\n");
        hasher.update(context.as_bytes());
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("{}_{}_{hex}", chunk.kind.as_str(), chunk.id)
}

/// JSON-blob-per-key cache directory.
#[derive(Debug, Clone)]
pub struct ConversionCache {
    dir: PathBuf,
}

impl ConversionCache {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(ConversionCache { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn load(&self, key: &str) -> Option<TranslationResponse> {
        let path = self.path_for(key);
        let text = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(key, error = %e, "unreadable cache entry, ignoring");
                None
            }
        }
    }

    /// Persist a successful response. Write failures are logged, not fatal:
    /// the cache is an optimization.
    pub fn store(&self, key: &str, response: &TranslationResponse) {
        let path = self.path_for(key);
        match serde_json::to_string(response) {
            Ok(text) => {
                if let Err(e) = std::fs::write(&path, text) {
                    tracing::warn!(key, error = %e, "failed to write cache entry");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "failed to encode cache entry"),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    pub fn clear(&self) -> std::io::Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        std::fs::create_dir_all(&self.dir)
    }
}
