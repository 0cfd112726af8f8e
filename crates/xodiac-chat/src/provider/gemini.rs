//! Gemini REST client for streamed, search-grounded generation.
//!
//! Calls `:streamGenerateContent?alt=sse` and turns each server-sent event
//! into a [`SearchChunk`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use xodiac_core::config::SearchConfig;
use xodiac_core::{Role, Source};

use super::search::{SearchBackend, SearchChunk, SearchRequest};
use super::HistoryTurn;
use crate::error::ChatError;

/// HTTP client for the Gemini streaming endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    idle_timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &SearchConfig) -> Result<Self, ChatError> {
        let idle_timeout = Duration::from_secs(config.idle_timeout_secs.max(1));
        let client = Client::builder()
            .connect_timeout(idle_timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            idle_timeout,
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl SearchBackend for GeminiClient {
    async fn stream_generate(
        &self,
        request: &SearchRequest,
        chunks: mpsc::Sender<SearchChunk>,
    ) -> Result<(), ChatError> {
        if self.api_key.is_empty() {
            return Err(ChatError::Config(
                "search API key is not configured".to_string(),
            ));
        }

        let body = GenerateContentRequest::from_search_request(request);
        let send = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send();
        // Response headers count against the same idle budget as body chunks.
        let response = tokio::time::timeout(self.idle_timeout, send)
            .await
            .map_err(|_| ChatError::Timeout(self.idle_timeout))??;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ChatError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            let next = tokio::time::timeout(self.idle_timeout, stream.next())
                .await
                .map_err(|_| ChatError::Timeout(self.idle_timeout))?;
            let Some(bytes) = next else { break };
            buffer.extend_from_slice(&bytes?);

            // Process complete lines; a multi-byte character may straddle chunks.
            while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=line_end).collect();
                if let Some(chunk) = parse_sse_line(&String::from_utf8_lossy(&line))? {
                    if chunks.send(chunk).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }

        if !buffer.is_empty() {
            if let Some(chunk) = parse_sse_line(&String::from_utf8_lossy(&buffer))? {
                let _ = chunks.send(chunk).await;
            }
        }
        Ok(())
    }
}

/// Parse one SSE line. Non-data lines and keep-alives yield `None`.
pub fn parse_sse_line(line: &str) -> Result<Option<SearchChunk>, ChatError> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let parsed: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| ChatError::MalformedResponse(format!("stream chunk: {}", e)))?;
    let chunk = parsed.into_chunk();
    debug!(
        text_len = chunk.text.as_ref().map_or(0, String::len),
        sources = chunk.sources.len(),
        "Parsed stream chunk"
    );
    Ok(Some(chunk))
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

impl GenerateContentRequest {
    fn from_search_request(request: &SearchRequest) -> Self {
        let contents = request
            .turns
            .iter()
            .map(|HistoryTurn { role, text }| Content {
                role: wire_role(*role),
                parts: vec![TextPart { text: text.clone() }],
            })
            .collect();
        let tools = if request.web_search {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };
        Self {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: request.system_instruction.clone(),
                }],
            },
            tools,
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text and web citations of the first candidate.
    fn into_chunk(self) -> SearchChunk {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return SearchChunk::default();
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let sources = candidate
            .grounding_metadata
            .map(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .filter_map(|web| {
                let uri = web.uri.filter(|u| !u.is_empty())?;
                let title = web.title.unwrap_or_else(|| uri.clone());
                Some(Source { title, uri })
            })
            .collect();

        SearchChunk {
            text: (!text.is_empty()).then_some(text),
            sources,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    uri: Option<String>,
    title: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
