//! OpenAI-compatible provider implementation.
//!
//! One implementation serves every preset in [`crate::profile`]: OpenAI,
//! Groq, Mistral, Gemini's OpenAI endpoint, and any custom endpoint.
//!
//! Supports:
//! - Chat completions, non-streaming and streaming SSE
//! - Tool use / function calling
//!
//! Only a connect timeout is set. There is no retry.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use yugent_core::error::ProviderError;
use yugent_core::message::{Message, MessageContent, MessageToolCall, Role};
use yugent_core::provider::{ChatRequest, FinishReason, FragmentStream, ProviderResponse};
use yugent_core::tool::ToolDefinition;

use crate::profile::{Credential, EndpointProfile};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// An OpenAI-compatible chat-completion provider.
pub struct OpenAiCompatProvider {
    profile: EndpointProfile,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider with the default 60 s connect timeout.
    pub fn new(profile: EndpointProfile) -> Result<Self, ProviderError> {
        Self::with_connect_timeout(profile, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(
        profile: EndpointProfile,
        connect_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { profile, client })
    }

    pub fn profile(&self) -> &EndpointProfile {
        &self.profile
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.profile.base_url = base_url.into();
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.profile.credential = credential;
    }

    /// Convert our Message types to the API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
            })
            .collect()
    }

    fn request_body(request: &ChatRequest, stream: bool) -> ApiRequest<'_> {
        let has_tools = !request.tools.is_empty();
        ApiRequest {
            messages: Self::to_api_messages(&request.messages),
            tools: &request.tools,
            tool_choice: has_tools.then_some("auto"),
            model: &request.model,
            stream,
        }
    }

    fn authorization(&self) -> Option<String> {
        self.profile
            .credential
            .resolve()
            .map(|key| format!("Bearer {key}"))
    }

    /// POST the request and fail on any status other than 200.
    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = self.profile.url();
        let body = Self::request_body(request, stream);

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(auth) = self.authorization() {
            builder = builder.header("Authorization", auth);
        }
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }
        for (name, value) in &self.profile.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(
            provider = %self.profile.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            stream,
            "Sending completion request"
        );

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.profile.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl yugent_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn complete(&self, request: ChatRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self.send(&request, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let mut message = Message::assistant_tool_calls(None, tool_calls);
        message.content = choice.message.content;
        if let Some(role) = choice.message.role.as_deref() {
            message.role = Role::from_wire(role);
        }

        Ok(ProviderResponse {
            message,
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from),
        })
    }

    async fn stream(&self, request: ChatRequest) -> Result<FragmentStream, ProviderError> {
        let response = self.send(&request, true).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.profile.name.clone();

        // Forward the body as decoded text; the caller does the SSE parsing.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut pending: Vec<u8> = Vec::new();

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        debug!(provider = %provider_name, "Stream receiver dropped, aborting body read");
                        return;
                    }
                    next = byte_stream.next() => next,
                };
                let Some(chunk_result) = next else {
                    break;
                };
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                pending.extend_from_slice(&bytes);
                let text = drain_utf8(&mut pending);
                if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                    return; // receiver dropped
                }
            }

            if !pending.is_empty() {
                let _ = tx
                    .send(Ok(String::from_utf8_lossy(&pending).into_owned()))
                    .await;
            }
        });

        Ok(rx)
    }
}

/// Take the longest decodable prefix of `pending`, leaving an incomplete
/// trailing UTF-8 sequence for the next chunk.
fn drain_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(valid);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

// --- API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    model: &'a str,
    stream: bool,
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<MessageContent>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use serde_json::json;
    use yugent_core::Provider;
    use yugent_core::schema::{PropertyMap, PropertySchema};

    fn provider_for(server: &Server) -> OpenAiCompatProvider {
        let profile = EndpointProfile::openai()
            .with_base_url(server.url_str(""))
            .with_credential(Credential::Static("test-key".into()));
        OpenAiCompatProvider::new(profile).unwrap()
    }

    fn request(stream: bool) -> ChatRequest {
        ChatRequest {
            model: "gpt-test".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            stream,
        }
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_tool_calls(
            None,
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "read_file".into(),
                arguments: r#"{"path":"a.txt"}"#.into(),
            }],
        );
        let api = serde_json::to_value(OpenAiCompatProvider::to_api_messages(&[msg])).unwrap();
        assert_eq!(
            api[0],
            json!({
                "role": "assistant",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": "read_file", "arguments": "{\"path\":\"a.txt\"}" }
                }]
            })
        );
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "result data");
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn body_omits_tools_when_none_registered() {
        let req = request(false);
        let body = serde_json::to_value(OpenAiCompatProvider::request_body(&req, false)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn body_includes_tools_and_auto_choice() {
        let mut req = request(true);
        req.tools = vec![ToolDefinition::function(
            "read_file",
            "Read a file",
            PropertyMap::new().with("path", PropertySchema::string()),
        )];
        let body = serde_json::to_value(OpenAiCompatProvider::request_body(&req, true)).unwrap();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn bearer_header_from_credential() {
        let provider = OpenAiCompatProvider::new(
            EndpointProfile::groq().with_credential(Credential::Static("gsk".into())),
        )
        .unwrap();
        assert_eq!(provider.authorization().as_deref(), Some("Bearer gsk"));
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn drain_utf8_keeps_split_code_points() {
        let bytes = "héllo".as_bytes();
        let mut pending = bytes[..2].to_vec();
        assert_eq!(drain_utf8(&mut pending), "h");
        assert_eq!(pending.len(), 1);
        pending.extend_from_slice(&bytes[2..]);
        assert_eq!(drain_utf8(&mut pending), "éllo");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn complete_parses_text_response() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/chat/completions"),
                request::headers(contains(key("authorization"))),
            ])
            .respond_with(json_encoded(json!({
                "id": "test",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "hello" },
                    "finish_reason": "stop"
                }]
            }))),
        );

        let response = provider_for(&server).complete(request(false)).await.unwrap();
        assert_eq!(response.message.text(), "hello");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert!(!response.wants_tools());
    }

    #[tokio::test]
    async fn complete_parses_tool_calls() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/chat/completions"))
                .respond_with(json_encoded(json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": null,
                            "tool_calls": [{
                                "id": "call_9",
                                "type": "function",
                                "function": { "name": "get_weather", "arguments": "{\"city\":\"Oslo\"}" }
                            }]
                        },
                        "finish_reason": "tool_calls"
                    }]
                }))),
        );

        let response = provider_for(&server).complete(request(false)).await.unwrap();
        assert!(response.wants_tools());
        assert!(response.message.content.is_none());
        assert_eq!(response.message.tool_calls[0].id, "call_9");
        assert_eq!(response.message.tool_calls[0].arguments, r#"{"city":"Oslo"}"#);
    }

    #[tokio::test]
    async fn complete_accepts_single_text_part() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/chat/completions"))
                .respond_with(json_encoded(json!({
                    "choices": [{
                        "message": {
                            "role": "assistant",
                            "content": { "type": "text", "text": "structured hello" }
                        },
                        "finish_reason": "stop"
                    }]
                }))),
        );

        let response = provider_for(&server).complete(request(false)).await.unwrap();
        assert_eq!(response.message.text(), "structured hello");
    }

    #[tokio::test]
    async fn runtime_changes_reach_the_wire() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/chat/completions"),
                request::headers(contains(("authorization", "Bearer rotated-key"))),
                request::headers(contains(("x-org", "acme"))),
            ])
            .respond_with(json_encoded(json!({
                "choices": [{
                    "message": { "role": "assistant", "content": "ok" },
                    "finish_reason": "stop"
                }]
            }))),
        );

        let profile = EndpointProfile::openai()
            .with_base_url("http://127.0.0.1:9")
            .with_credential(Credential::Static("stale-key".into()))
            .with_header("x-org", "acme");
        let mut provider = OpenAiCompatProvider::new(profile).unwrap();
        provider.set_base_url(server.url_str(""));
        provider.set_credential(Credential::Static("rotated-key".into()));

        let response = provider.complete(request(false)).await.unwrap();
        assert_eq!(response.message.text(), "ok");
        assert_eq!(provider.profile().extra_headers.len(), 1);
    }

    #[tokio::test]
    async fn non_200_surfaces_raw_body() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/chat/completions"))
                .respond_with(status_code(400).body("bad request body")),
        );

        let err = provider_for(&server).complete(request(false)).await.unwrap_err();
        match err {
            ProviderError::ApiError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 400);
                assert_eq!(message, "bad request body");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_forwards_body_text() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                   data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n\
                   data: [DONE]\n\n";
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/chat/completions"))
                .respond_with(
                    status_code(200)
                        .append_header("Content-Type", "text/event-stream")
                        .body(sse),
                ),
        );

        let mut rx = provider_for(&server).stream(request(true)).await.unwrap();
        let mut body = String::new();
        while let Some(fragment) = rx.recv().await {
            body.push_str(&fragment.unwrap());
        }
        assert_eq!(body, sse);
    }

    #[tokio::test]
    async fn stream_error_status_fails_before_body() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/chat/completions"))
                .respond_with(status_code(401).body("invalid key")),
        );

        let err = provider_for(&server).stream(request(true)).await.unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 401, .. }));
    }
}
