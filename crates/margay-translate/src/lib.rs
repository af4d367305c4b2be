//! C-to-C# translation backends.
//!
//! The translator is a narrow capability: turn one [`CProgram`] into C#
//! source, or say you cannot. Three implementations exist (the LLM-backed
//! client, a deterministic rule-based converter, and an emergency stub)
//! plus a composite that tries them in order with structural validation
//! gating the LLM output.

pub mod cache;
pub mod chunk;
pub mod gemini;
pub mod hybrid;
pub mod rate_limit;
pub mod rules;

pub use cache::{cache_key, ConversionCache, TranslationResponse};
pub use chunk::{chunk_program, ChunkKind, ConversionChunk};
pub use gemini::{GeminiConfig, GeminiTranslator};
pub use hybrid::{create_translator, emergency_stub, HybridTranslator};
pub use rate_limit::{extract_retry_delay, is_quota_error, RateLimiter};
pub use rules::{RuleTranslator, TypeMapper};

use margay_model::CProgram;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translator `{0}` is not available")]
    Unavailable(String),
    #[error("circular dependency detected between conversion chunks")]
    CircularChunks,
    #[error("chunk {chunk_id} failed: {reason}")]
    ChunkFailed { chunk_id: String, reason: String },
    #[error("translated output failed structural validation: {0}")]
    Validation(String),
    #[error("API returned status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("every translation strategy failed for {0}")]
    AllFailed(String),
    #[error("cache I/O error: {0}")]
    Cache(#[from] std::io::Error),
}

/// Pluggable conversion capability.
///
/// `context` carries the C# already produced for programs earlier in the
/// conversion order; backends that prompt a model feed it in so signatures
/// stay consistent across translation units, deterministic backends ignore
/// it.
pub trait Translator {
    fn convert(&self, program: &CProgram) -> Result<String, TranslateError> {
        self.convert_with_context(program, &[])
    }

    fn convert_with_context(
        &self,
        program: &CProgram,
        context: &[String],
    ) -> Result<String, TranslateError>;

    fn available(&self) -> bool;

    fn name(&self) -> &'static str;
}
