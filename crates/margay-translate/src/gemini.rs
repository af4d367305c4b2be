//! LLM-backed translator client.
//!
//! Chunks are submitted level by level: at each step every chunk whose
//! dependencies are done goes out, fanned across scoped worker threads up
//! to `max_parallel`, all sharing one sliding-window rate limiter. Each
//! request is content-addressed against the on-disk cache first. Quota
//! rejections honor the server-suggested delay and otherwise back off
//! exponentially; transport errors back off on a shorter curve; any other
//! non-2xx answer fails the chunk without retry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;

use margay_model::CProgram;

use crate::cache::{cache_key, ConversionCache, TranslationResponse};
use crate::chunk::{chunk_program, ChunkKind, ConversionChunk};
use crate::rate_limit::{
    extract_retry_delay, is_quota_error, quota_backoff, transport_backoff, RateLimiter,
};
use crate::{TranslateError, Translator};

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Falls back to the `GEMINI_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub cache_dir: PathBuf,
    pub max_parallel: usize,
    /// Function bodies beyond this many characters are split.
    pub chunk_size: usize,
    pub max_requests_per_minute: usize,
    pub max_retries: u32,
    /// Overridable for tests against a local endpoint.
    pub endpoint_base: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: std::env::var(API_KEY_ENV).ok(),
            model: "gemini-2.5-pro".to_string(),
            max_tokens: 8192,
            cache_dir: PathBuf::from(".conversion_cache"),
            max_parallel: 5,
            chunk_size: 2000,
            max_requests_per_minute: 1,
            max_retries: 3,
            endpoint_base: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// Cumulative request accounting for a translator instance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationStats {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub cache_hits: u64,
    pub total_time: f64,
}

pub struct GeminiTranslator {
    config: GeminiConfig,
    cache: Option<ConversionCache>,
    rate_limiter: Mutex<RateLimiter>,
    stats: Mutex<TranslationStats>,
}

impl GeminiTranslator {
    pub fn new(config: GeminiConfig) -> Self {
        let cache = match ConversionCache::new(&config.cache_dir) {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(
                    dir = %config.cache_dir.display(),
                    error = %e,
                    "cache directory unavailable, running uncached"
                );
                None
            }
        };
        if config.api_key.is_none() {
            tracing::warn!(
                "no API key configured; set {API_KEY_ENV} to enable LLM translation"
            );
        } else {
            tracing::info!(
                rate = config.max_requests_per_minute,
                "LLM translator initialized"
            );
        }
        let limiter = RateLimiter::new(config.max_requests_per_minute);
        GeminiTranslator {
            cache,
            rate_limiter: Mutex::new(limiter),
            stats: Mutex::new(TranslationStats::default()),
            config,
        }
    }

    pub fn stats(&self) -> TranslationStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.config.endpoint_base, self.config.model
        )
    }

    /// Submit every ready chunk level by level until all are done.
    fn process_chunks(
        &self,
        chunks: &[ConversionChunk],
        context: &str,
    ) -> Result<HashMap<String, TranslationResponse>, TranslateError> {
        let mut done: HashMap<String, TranslationResponse> = HashMap::new();
        let mut remaining: Vec<&ConversionChunk> = chunks.iter().collect();

        while !remaining.is_empty() {
            let (ready, rest): (Vec<&ConversionChunk>, Vec<&ConversionChunk>) =
                remaining.into_iter().partition(|chunk| {
                    chunk.dependencies.iter().all(|dep| done.contains_key(dep))
                });
            if ready.is_empty() {
                return Err(TranslateError::CircularChunks);
            }
            remaining = rest;

            for batch in ready.chunks(self.config.max_parallel.max(1)) {
                let results: Vec<(String, TranslationResponse)> = std::thread::scope(|scope| {
                    let handles: Vec<_> = batch
                        .iter()
                        .map(|&chunk| {
                            scope.spawn(move || {
                                (chunk.id.clone(), self.convert_chunk_cached(chunk, context))
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .filter_map(|handle| handle.join().ok())
                        .collect()
                });

                for (id, response) in results {
                    if response.success {
                        tracing::info!(chunk = %id, "chunk converted");
                    } else {
                        tracing::warn!(chunk = %id, reason = %response.explanation, "chunk failed");
                    }
                    done.insert(id, response);
                }
            }
        }
        Ok(done)
    }

    fn convert_chunk_cached(&self, chunk: &ConversionChunk, context: &str) -> TranslationResponse {
        let key = cache_key(chunk, context);
        if let Some(cache) = &self.cache {
            if let Some(response) = cache.load(&key) {
                tracing::debug!(chunk = %chunk.id, "cache hit");
                if let Ok(mut stats) = self.stats.lock() {
                    stats.cache_hits += 1;
                }
                return response;
            }
        }

        let response = self.convert_chunk_remote(chunk, context);
        if response.success {
            if let Some(cache) = &self.cache {
                cache.store(&key, &response);
            }
        }
        response
    }

    fn convert_chunk_remote(&self, chunk: &ConversionChunk, context: &str) -> TranslationResponse {
        let started = Instant::now();
        let Some(api_key) = self.config.api_key.clone() else {
            return TranslationResponse::failure("no API key configured", 0.0);
        };

        let prompt = build_prompt(chunk, context);
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": self.config.max_tokens,
                "temperature": 0.1,
                "topP": 0.8,
                "topK": 40,
            },
        });
        let url = self.endpoint();

        for attempt in 0..=self.config.max_retries {
            self.block_for_rate_limit();
            if let Ok(mut stats) = self.stats.lock() {
                stats.total_requests += 1;
            }

            let result = ureq::post(&url)
                .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
                .set("Content-Type", "application/json")
                .set("x-goog-api-key", &api_key)
                .send_json(payload.clone());

            match result {
                Ok(response) => match response.into_json::<serde_json::Value>() {
                    Ok(value) => match parse_generate_response(&value) {
                        Some((text, tokens)) => {
                            if let Ok(mut stats) = self.stats.lock() {
                                stats.total_tokens += tokens;
                            }
                            return TranslationResponse {
                                success: true,
                                converted_code: text,
                                explanation: "converted by LLM".to_string(),
                                warnings: Vec::new(),
                                tokens_used: tokens,
                                processing_time: started.elapsed().as_secs_f64(),
                            };
                        }
                        None => {
                            return TranslationResponse::failure(
                                "malformed API response: no candidate text",
                                started.elapsed().as_secs_f64(),
                            );
                        }
                    },
                    Err(e) => {
                        return TranslationResponse::failure(
                            format!("unreadable API response: {e}"),
                            started.elapsed().as_secs_f64(),
                        );
                    }
                },
                Err(ureq::Error::Status(status, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    if is_quota_error(status, &body) && attempt < self.config.max_retries {
                        let delay =
                            extract_retry_delay(&body).unwrap_or_else(|| quota_backoff(attempt));
                        tracing::warn!(
                            chunk = %chunk.id,
                            delay_secs = delay.as_secs_f64(),
                            attempt = attempt + 1,
                            max = self.config.max_retries,
                            "quota exceeded, retrying"
                        );
                        std::thread::sleep(delay);
                        continue;
                    }
                    let truncated: String = body.chars().take(500).collect();
                    return TranslationResponse::failure(
                        format!("API error {status}: {truncated}"),
                        started.elapsed().as_secs_f64(),
                    );
                }
                Err(transport) => {
                    if attempt < self.config.max_retries {
                        let delay = transport_backoff(attempt);
                        tracing::warn!(
                            chunk = %chunk.id,
                            delay_secs = delay.as_secs(),
                            error = %transport,
                            "transport error, retrying"
                        );
                        std::thread::sleep(delay);
                        continue;
                    }
                    return TranslationResponse::failure(
                        format!("request failed: {transport}"),
                        started.elapsed().as_secs_f64(),
                    );
                }
            }
        }

        TranslationResponse::failure(
            "all retry attempts failed",
            started.elapsed().as_secs_f64(),
        )
    }

    fn block_for_rate_limit(&self) {
        loop {
            let wait = self
                .rate_limiter
                .lock()
                .map(|mut limiter| limiter.reserve())
                .unwrap_or(None);
            match wait {
                None => return,
                Some(delay) => std::thread::sleep(delay),
            }
        }
    }

    /// Concatenate converted chunks in canonical order under one class.
    fn assemble(
        &self,
        program: &CProgram,
        converted: &HashMap<String, TranslationResponse>,
    ) -> String {
        let mut lines: Vec<String> = vec![
            "using System;".to_string(),
            "using System.Runtime.InteropServices;".to_string(),
            String::new(),
            "public class ConvertedCode".to_string(),
            "{".to_string(),
        ];

        let mut append = |lines: &mut Vec<String>, id: &str| {
            if let Some(response) = converted.get(id) {
                if response.success {
                    for line in response.converted_code.lines() {
                        lines.push(format!("    {line}"));
                    }
                    lines.push(String::new());
                }
            }
        };

        append(&mut lines, "defines");
        for enum_def in &program.enums {
            append(&mut lines, &format!("enum_{}", enum_def.name));
        }
        for struct_def in &program.structs {
            append(&mut lines, &format!("struct_{}", struct_def.name));
        }
        append(&mut lines, "globals");
        for func in &program.functions {
            let single = format!("func_{}", func.name);
            if converted.contains_key(&single) {
                append(&mut lines, &single);
            } else {
                let mut part = 1;
                loop {
                    let id = format!("func_{}_part{part}", func.name);
                    if !converted.contains_key(&id) {
                        break;
                    }
                    append(&mut lines, &id);
                    part += 1;
                }
            }
        }

        lines.push("}".to_string());
        dedup_usings(&lines.join("\n"))
    }
}

impl Translator for GeminiTranslator {
    fn convert_with_context(
        &self,
        program: &CProgram,
        context: &[String],
    ) -> Result<String, TranslateError> {
        if !self.available() {
            return Err(TranslateError::Unavailable(self.name().to_string()));
        }

        let started = Instant::now();
        tracing::info!(program_id = %program.program_id, "starting LLM conversion");

        let chunks = chunk_program(program, self.config.chunk_size);
        tracing::info!(chunks = chunks.len(), "created conversion chunks");

        let context_text = render_context(context);
        let converted = self.process_chunks(&chunks, &context_text)?;
        let code = self.assemble(program, &converted);

        if let Ok(mut stats) = self.stats.lock() {
            stats.total_time += started.elapsed().as_secs_f64();
        }
        tracing::info!(
            program_id = %program.program_id,
            elapsed_s = started.elapsed().as_secs_f64(),
            "LLM conversion finished"
        );
        Ok(code)
    }

    fn available(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Pull candidate text and token usage out of a generateContent response.
fn parse_generate_response(value: &serde_json::Value) -> Option<(String, u64)> {
    let text = value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()?
        .to_string();
    let tokens = value
        .get("usageMetadata")
        .and_then(|m| m.get("totalTokenCount"))
        .and_then(|t| t.as_u64())
        .unwrap_or(0);
    Some((text, tokens))
}

/// Remove duplicate `using` lines, keeping first occurrences in place.
pub fn dedup_usings(code: &str) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<&str> = Vec::new();
    for line in code.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("using ") {
            if seen.iter().any(|s| s == trimmed) {
                continue;
            }
            seen.push(trimmed.to_string());
        }
        out.push(line);
    }
    out.join("\n")
}

/// Render the accumulated C# of earlier conversions into one prompt
/// section, newest entries first, capped so long runs cannot flood the
/// token budget.
fn render_context(context: &[String]) -> String {
    const CONTEXT_CAP: usize = 6000;
    let mut rendered = String::new();
    for entry in context.iter().rev() {
        if rendered.len() + entry.len() + 2 > CONTEXT_CAP {
            break;
        }
        if !rendered.is_empty() {
            rendered.push_str("\n\n");
        }
        rendered.push_str(entry);
    }
    rendered
}

fn context_section(context: &str) -> String {
    if context.is_empty() {
        return String::new();
    }
    format!(
        "\n\nC# already produced for files this code depends on. Keep type and \
         method signatures consistent with it:\n```csharp\n{context}\n```"
    )
}

fn build_prompt(chunk: &ConversionChunk, context: &str) -> String {
    match chunk.kind {
        ChunkKind::Harness => format!(
            "You are an expert C# test harness writer. Generate a C# test harness for the following C# method(s).\n\
             - Place the harness code in a public class named Program.\n\
             - The class must contain a public static void Main(string[] args) method.\n\
             - In Main, invoke the method(s) with representative test cases and print outputs using Console.WriteLine in the format: \"Test <name>: result = <value>\".\n\
             - Do not use external dependencies or frameworks. Do not generate the method implementations, just the harness.\n\n\
             C# method skeleton(s):\n{}",
            chunk.content
        ),
        _ if chunk.content.len() > 5000 => format!(
            "You are an expert C to C# converter. Convert the following C PROJECT (multiple files) to idiomatic, high-accuracy C#.\n\
             - This is a MULTI-FILE PROJECT: understand the relationships and dependencies between files.\n\
             - Place ALL converted code in a SINGLE public class called ConvertedCode.\n\
             - Maintain all functions, structs, enums, and constants from ALL files.\n\
             - Preserve function calls and dependencies between files correctly.\n\
             - Do NOT add a Main method, entrypoint, or any test harness.\n\
             - Do not include example usage, test code, or unnecessary comments.\n\
             - Use proper C# naming, pointer and struct conversion, memory management, and .NET conventions.\n\
             - Ensure all functions are public static methods of the ConvertedCode class.\n\n\
             C project code to convert:\n```c\n{}\n```{}",
            chunk.content,
            context_section(context)
        ),
        _ => format!(
            "You are an expert C to C# converter. Convert the following C code to idiomatic, high-accuracy C#.\n\
             - Place the converted member(s) in a public class called ConvertedCode.\n\
             - Do NOT add a Main method, entrypoint, or any test harness.\n\
             - Do not include example usage, test code, or unnecessary comments.\n\
             - Use proper C# naming, pointer and struct conversion, memory management, and .NET conventions.\n\n\
             C code to convert:\n```c\n{}\n```{}",
            chunk.content,
            context_section(context)
        ),
    }
}
