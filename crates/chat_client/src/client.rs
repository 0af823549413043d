use std::time::Duration;

use chat_core::{Config, WireMessage};
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Proxy, RequestBuilder, StatusCode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, TransportError};
use crate::frame::FrameDecoder;
use crate::models::{ChatRequest, ChatResponse, HealthStatus};
use crate::transport::{ChatTransport, OpenedStream, StreamEvent, StreamHandle};

const EVENT_STREAM: &str = "text/event-stream";

/// HTTP client for the chat service.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    api_url: String,
}

impl ChatClient {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a client honoring the proxy and timeout settings of `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if !config.http_proxy.is_empty() {
            builder = builder.proxy(Proxy::http(&config.http_proxy)?);
        }
        if !config.https_proxy.is_empty() {
            builder = builder.proxy(Proxy::https(&config.https_proxy)?);
        }
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        Ok(Self::new(config.api_url.clone()).with_http_client(builder.build()?))
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat/", self.api_url)
    }

    pub fn health_url(&self) -> String {
        format!("{}/health/", self.api_url)
    }

    /// Single-shot request returning the whole reply at once.
    pub async fn complete(&self, messages: &[WireMessage]) -> Result<String> {
        let response = self
            .client
            .post(self.chat_url())
            .json(&ChatRequest { messages })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        Ok(parsed.response)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.client.get(self.health_url()).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

impl ChatTransport for ChatClient {
    /// Spawns the exchange on the current tokio runtime.
    fn open(&self, messages: Vec<WireMessage>) -> OpenedStream {
        let handle = StreamHandle::new();
        let (event_tx, events) = mpsc::unbounded_channel();

        log::debug!(
            "[{}] Opening chat stream with {} messages",
            handle.id(),
            messages.len()
        );

        let request = self
            .client
            .post(self.chat_url())
            .header(ACCEPT, EVENT_STREAM)
            .json(&ChatRequest {
                messages: &messages,
            });

        tokio::spawn(run_exchange(request, handle.clone(), event_tx));

        OpenedStream { handle, events }
    }
}

async fn run_exchange(
    request: RequestBuilder,
    handle: StreamHandle,
    event_tx: mpsc::UnboundedSender<StreamEvent>,
) {
    let stream_id = handle.id();
    let token = handle.token().clone();

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        outcome = read_stream(request, &token, &event_tx, stream_id) => Some(outcome),
    };

    if token.is_cancelled() {
        log::debug!("[{}] Stream settled by cancellation", stream_id);
        return;
    }

    match outcome {
        Some(Ok(())) => {
            log::debug!("[{}] Stream completed", stream_id);
            let _ = event_tx.send(StreamEvent::Done);
        }
        Some(Err(error)) => {
            log::warn!("[{}] Stream failed: {}", stream_id, error);
            let _ = event_tx.send(StreamEvent::Failed(error));
        }
        None => {}
    }
}

async fn read_stream(
    request: RequestBuilder,
    token: &CancellationToken,
    event_tx: &mpsc::UnboundedSender<StreamEvent>,
    stream_id: Uuid,
) -> Result<()> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
        return Err(TransportError::MissingBody);
    }

    let mut decoder = FrameDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let decoded = decoder.decode(&chunk?);

        for payload in decoded.payloads {
            if token.is_cancelled() {
                return Ok(());
            }
            log::trace!("[{}] Chunk: {:?}", stream_id, payload);
            if event_tx.send(StreamEvent::Chunk(payload)).is_err() {
                log::debug!("[{}] Receiver dropped, stopping stream", stream_id);
                return Ok(());
            }
        }

        if decoded.done {
            return Ok(());
        }
    }

    if decoder.pending_len() > 0 {
        log::debug!(
            "[{}] Stream closed with {} bytes of an unterminated frame",
            stream_id,
            decoder.pending_len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::Message;
    use serde_json::json;
    use tokio::time::timeout;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect_events(opened: OpenedStream) -> Vec<StreamEvent> {
        let mut events = opened.events;
        let mut out = Vec::new();
        while let Some(event) = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("stream stalled")
        {
            out.push(event);
        }
        out
    }

    fn chunks(events: &[StreamEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Chunk(payload) => Some(payload.as_str()),
                _ => None,
            })
            .collect()
    }

    async fn mount_stream(server: &MockServer, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    fn hi() -> Vec<WireMessage> {
        vec![Message::user("Hi").to_wire()]
    }

    #[test]
    fn test_urls_are_built_from_api_url() {
        let client = ChatClient::new("http://localhost:8000/api/");
        assert_eq!(client.api_url(), "http://localhost:8000/api");
        assert_eq!(client.chat_url(), "http://localhost:8000/api/chat/");
        assert_eq!(client.health_url(), "http://localhost:8000/api/health/");
    }

    #[test]
    fn test_from_config_rejects_invalid_proxy() {
        let config = Config {
            http_proxy: "http://[::1".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            ChatClient::from_config(&config),
            Err(TransportError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_open_posts_transcript_as_event_stream_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/"))
            .and(header("accept", "text/event-stream"))
            .and(body_json(json!({
                "messages": [
                    { "role": "assistant", "content": "Hello!" },
                    { "role": "user", "content": "Hi" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: ok\n\ndata: [DONE]\n\n"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let messages = vec![
            Message::assistant("Hello!").to_wire(),
            Message::user("Hi").to_wire(),
        ];
        let events = collect_events(client.open(messages)).await;

        assert_eq!(chunks(&events), vec!["ok"]);
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
    }

    #[tokio::test]
    async fn test_sentinel_terminated_stream_completes() {
        let server = MockServer::start().await;
        mount_stream(&server, "data: Hel\n\ndata: lo!\n\ndata: [DONE]\n\ndata: late\n\n").await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let events = collect_events(client.open(hi())).await;

        assert_eq!(chunks(&events), vec!["Hel", "lo!"]);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[2], StreamEvent::Done));
    }

    #[tokio::test]
    async fn test_close_terminated_stream_completes() {
        let server = MockServer::start().await;
        mount_stream(&server, "data: Hel\n\ndata: lo!\n\ndata: trunc").await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let events = collect_events(client.open(hi())).await;

        assert_eq!(chunks(&events), vec!["Hel", "lo!"]);
        assert!(matches!(events.last(), Some(StreamEvent::Done)));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, StreamEvent::Done | StreamEvent::Failed(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_non_success_status_fails_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let events = collect_events(client.open(hi())).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Failed(TransportError::Status { status, body }) => {
                assert_eq!(*status, 500);
                assert_eq!(body, "model crashed");
            }
            other => panic!("expected status failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_success_body_is_missing_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let events = collect_events(client.open(hi())).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            StreamEvent::Failed(TransportError::MissingBody)
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ChatClient::new(format!("http://{addr}/api"));
        let events = collect_events(client.open(hi())).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            StreamEvent::Failed(TransportError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_abort_before_headers_settles_silently() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("data: too late\n\ndata: [DONE]\n\n")
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let opened = client.open(hi());
        let handle = opened.handle.clone();
        handle.abort();

        let events = collect_events(opened).await;
        assert!(events.is_empty(), "unexpected events: {events:?}");

        // After settlement abort stays a no-op.
        handle.abort();
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn test_complete_returns_response_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/"))
            .and(body_json(json!({ "messages": [{ "role": "user", "content": "Hi" }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "Hello!" })))
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let reply = client.complete(&hi()).await.expect("reply");
        assert_eq!(reply, "Hello!");
    }

    #[tokio::test]
    async fn test_complete_maps_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        assert!(matches!(
            client.complete(&hi()).await,
            Err(TransportError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_health_parses_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "version": "0.1.0",
                "model": { "name": "llama-2-7b-chat.gguf", "size_mb": 3891 }
            })))
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        let health = client.health().await.expect("health");
        assert!(health.is_ok());
        assert_eq!(health.version, "0.1.0");
        assert_eq!(health.model["name"], "llama-2-7b-chat.gguf");
    }

    #[tokio::test]
    async fn test_health_reports_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
            .mount(&server)
            .await;

        let client = ChatClient::new(format!("{}/api", server.uri()));
        match client.health().await {
            Err(TransportError::Status { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
