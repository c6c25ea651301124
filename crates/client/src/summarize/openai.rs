//! OpenAI-compatible chat-completions backend.
//!
//! Works against the hosted API or any local server speaking the same
//! protocol (set `summarizer.base_url`). Streaming responses are parsed from
//! SSE `data:` lines until `data: [DONE]`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use pagegist_core::config::DEFAULT_SUMMARIZER_BASE_URL;
use pagegist_core::{SummarizerConfig, SummaryFormat, SummaryKind, SummaryLength};
use reqwest::{StatusCode, header};
use serde::{Deserialize, Serialize};

use super::backend::{Availability, ChunkStream, SessionOptions, SummarizerBackend, SummarizerSession};
use super::BackendError;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Delta,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

fn check_status(status: StatusCode) -> Result<(), BackendError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::Auth),
        StatusCode::TOO_MANY_REQUESTS => Err(BackendError::RateLimited),
        s => Err(BackendError::Http { status: s.as_u16() }),
    }
}

/// System prompt encoding the session's style options.
fn system_prompt(options: &SessionOptions) -> String {
    let count = match options.length {
        SummaryLength::Short => "3",
        SummaryLength::Medium => "5",
        SummaryLength::Long => "7",
    };
    let shape = match options.kind {
        SummaryKind::KeyPoints => format!("the {count} most important key points"),
        SummaryKind::Tldr => format!("a short overview in {count} points"),
    };
    let format = match options.format {
        SummaryFormat::Markdown => "Respond only with a markdown bulleted list using \"- \" markers, one point per bullet.",
        SummaryFormat::PlainText => "Respond only with plain sentences, one point per sentence.",
    };

    let mut prompt = format!(
        "You summarize web pages. Extract {shape} of the page the user provides. {format} \
         Keep each point to one or two concise sentences and do not add commentary."
    );
    if let Some(shared) = options.shared_context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\n\nContext: ");
        prompt.push_str(shared.trim());
    }
    prompt
}

fn user_prompt(text: &str, context: Option<&str>) -> String {
    match context.filter(|c| !c.trim().is_empty()) {
        Some(context) => format!("{}\n\n{text}", context.trim()),
        None => text.to_string(),
    }
}

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: std::time::Duration,
}

impl From<&SummarizerConfig> for OpenAiConfig {
    fn from(config: &SummarizerConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            timeout: config.timeout(),
        }
    }
}

/// Summarization backend over an OpenAI-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    http: reqwest::Client,
    config: Arc<OpenAiConfig>,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| BackendError::Network(Arc::new(e)))?;
        Ok(Self { http, config: Arc::new(config) })
    }

}

#[async_trait]
impl SummarizerBackend for OpenAiBackend {
    /// Available with an API key, or keyless against a non-default base URL.
    async fn availability(&self) -> Availability {
        let custom_endpoint = self.config.base_url != DEFAULT_SUMMARIZER_BASE_URL.trim_end_matches('/');
        if self.config.api_key.is_some() || custom_endpoint {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    async fn create_session(&self, options: &SessionOptions) -> Result<Arc<dyn SummarizerSession>, BackendError> {
        if self.availability().await == Availability::Unavailable {
            return Err(BackendError::Unavailable(
                "no API key configured; set PAGEGIST_SUMMARIZER__API_KEY".into(),
            ));
        }
        tracing::debug!(model = %self.config.model, length = ?options.length, "created summarizer session");
        Ok(Arc::new(OpenAiSession {
            http: self.http.clone(),
            config: Arc::clone(&self.config),
            system_prompt: system_prompt(options),
        }))
    }
}

/// A session carrying the rendered system prompt.
pub struct OpenAiSession {
    http: reqwest::Client,
    config: Arc<OpenAiConfig>,
    system_prompt: String,
}

impl OpenAiSession {
    async fn send(&self, text: &str, context: Option<&str>, stream: bool) -> Result<reqwest::Response, BackendError> {
        let user = user_prompt(text, context);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message { role: "system", content: &self.system_prompt },
                Message { role: "user", content: &user },
            ],
            stream,
        };

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request.send().await?;
        check_status(response.status())?;
        Ok(response)
    }
}

#[async_trait]
impl SummarizerSession for OpenAiSession {
    async fn summarize(&self, text: &str, context: Option<&str>) -> Result<String, BackendError> {
        let response = self.send(text, context, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("failed to parse completion: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Parse("completion had no content".into()))
    }

    async fn summarize_streaming(&self, text: &str, context: Option<&str>) -> Result<ChunkStream, BackendError> {
        let response = self.send(text, context, true).await?;
        Ok(SseStream::new(response.bytes_stream()).boxed())
    }
}

/// Converts raw SSE bytes into content deltas, ending at `[DONE]`.
struct SseStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: String,
    pending: Vec<u8>,
    finished: bool,
}

impl SseStream {
    fn new(byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static) -> Self {
        Self { inner: Box::pin(byte_stream), buffer: String::new(), pending: Vec::new(), finished: false }
    }

    /// Append bytes, holding back an incomplete UTF-8 sequence at the end.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), BackendError> {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.pending.clear();
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = std::str::from_utf8(&self.pending[..valid])
                    .map_err(|e| BackendError::Stream(format!("invalid UTF-8 in stream: {e}")))?;
                self.buffer.push_str(text);
                self.pending.drain(..valid);
            }
            Err(e) => return Err(BackendError::Stream(format!("invalid UTF-8 in stream: {e}"))),
        }
        Ok(())
    }
}

enum SseLine {
    Delta(String),
    Done,
}

/// Take the next complete `data:` line from the buffer.
fn next_event(buffer: &mut String) -> Option<Result<SseLine, BackendError>> {
    loop {
        let newline = buffer.find('\n')?;
        let line = buffer[..newline].trim().to_string();
        buffer.drain(..=newline);

        let Some(data) = line.strip_prefix("data:") else {
            // Blank separators and "event:", "id:", "retry:" lines.
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Some(Ok(SseLine::Done));
        }

        return Some(match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => {
                Ok(SseLine::Delta(chunk.choices.into_iter().next().and_then(|c| c.delta.content).unwrap_or_default()))
            }
            Err(e) => Err(BackendError::Parse(format!(
                "failed to parse stream chunk: {e} (data: {})",
                data.chars().take(200).collect::<String>()
            ))),
        });
    }
}

impl Stream for SseStream {
    type Item = Result<String, BackendError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match next_event(&mut this.buffer) {
                Some(Ok(SseLine::Delta(delta))) if delta.is_empty() => continue,
                Some(Ok(SseLine::Delta(delta))) => return Poll::Ready(Some(Ok(delta))),
                Some(Ok(SseLine::Done)) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Some(Err(e)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                None => {}
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if let Err(e) = this.push_bytes(&bytes) {
                        this.finished = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(BackendError::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.finished = true;
                    // A final line without a trailing newline.
                    if !this.buffer.trim().is_empty() {
                        this.buffer.push('\n');
                        if let Some(Ok(SseLine::Delta(delta))) = next_event(&mut this.buffer)
                            && !delta.is_empty()
                        {
                            return Poll::Ready(Some(Ok(delta)));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String, api_key: Option<&str>) -> OpenAiConfig {
        OpenAiConfig {
            base_url,
            api_key: api_key.map(String::from),
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
        }
    }

    fn sse(lines: &[&str]) -> String {
        lines.iter().map(|l| format!("{l}\n\n")).collect()
    }

    #[tokio::test]
    async fn test_availability() {
        let hosted = OpenAiBackend::new(config(DEFAULT_SUMMARIZER_BASE_URL.into(), None)).unwrap();
        assert_eq!(hosted.availability().await, Availability::Unavailable);

        let keyed = OpenAiBackend::new(config(DEFAULT_SUMMARIZER_BASE_URL.into(), Some("sk"))).unwrap();
        assert_eq!(keyed.availability().await, Availability::Available);

        let local = OpenAiBackend::new(config("http://localhost:11434/v1".into(), None)).unwrap();
        assert_eq!(local.availability().await, Availability::Available);
    }

    #[tokio::test]
    async fn test_create_session_unavailable() {
        let backend = OpenAiBackend::new(config(DEFAULT_SUMMARIZER_BASE_URL.into(), None)).unwrap();
        let result = backend.create_session(&SessionOptions::default()).await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[test]
    fn test_system_prompt_reflects_options() {
        let prompt = system_prompt(&SessionOptions {
            length: SummaryLength::Long,
            shared_context: Some("Reader is a policy analyst.".into()),
            ..Default::default()
        });
        assert!(prompt.contains("7 most important key points"));
        assert!(prompt.contains("\"- \" markers"));
        assert!(prompt.ends_with("Context: Reader is a policy analyst."));
    }

    #[test]
    fn test_system_prompt_tldr_plain_text() {
        let prompt = system_prompt(&SessionOptions {
            kind: SummaryKind::Tldr,
            format: SummaryFormat::PlainText,
            ..Default::default()
        });
        assert!(prompt.contains("a short overview in 3 points"));
        assert!(prompt.contains("plain sentences"));
        assert!(!prompt.contains("markers"));
        assert!(!prompt.contains("Context:"));
    }

    #[tokio::test]
    async fn test_summarize_one_shot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header_matcher("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "test-model", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "- one\n- two"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(server.uri(), Some("sk-test"))).unwrap();
        let session = backend.create_session(&SessionOptions::default()).await.unwrap();
        let raw = session.summarize("page text", Some("Title")).await.unwrap();
        assert_eq!(raw, "- one\n- two");
    }

    #[tokio::test]
    async fn test_summarize_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(server.uri(), None)).unwrap();
        let session = backend.create_session(&SessionOptions::default()).await.unwrap();
        assert!(matches!(session.summarize("text", None).await, Err(BackendError::RateLimited)));
    }

    #[tokio::test]
    async fn test_summarize_streaming() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"- first"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"\n- second"}}]}"#,
            "data: [DONE]",
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(config(server.uri(), None)).unwrap();
        let session = backend.create_session(&SessionOptions::default()).await.unwrap();
        let chunks: Vec<String> = session
            .summarize_streaming("text", None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec!["- first", "\n- second"]);
    }

    #[tokio::test]
    async fn test_sse_split_across_byte_chunks() {
        let parts: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"caf")),
            Ok(Bytes::from_static(b"\xc3")),
            Ok(Bytes::from_static(b"\xa9\"}}]}\n\ndata: [DONE]\n\n")),
        ];
        let chunks: Vec<String> = SseStream::new(futures_util::stream::iter(parts))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec!["café"]);
    }

    #[tokio::test]
    async fn test_sse_malformed_chunk_is_error() {
        let parts: Vec<Result<Bytes, reqwest::Error>> = vec![Ok(Bytes::from_static(b"data: {not json}\n\n"))];
        let mut stream = SseStream::new(futures_util::stream::iter(parts));
        assert!(matches!(stream.next().await, Some(Err(BackendError::Parse(_)))));
        assert!(stream.next().await.is_none());
    }
}
