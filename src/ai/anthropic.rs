use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::{AiError, ChatProvider, RequestMessage, ResponseMessage};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn build_request_body(model: &str, max_tokens: u32, messages: &[RequestMessage]) -> Value {
        json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": messages,
        })
    }
}

/// Map a non-success HTTP status and its body to an error.
fn error_for_status(status: StatusCode, body: String) -> AiError {
    match status.as_u16() {
        401 | 403 => AiError::AuthError(body),
        429 => AiError::RateLimited(body),
        code => AiError::ApiError { status: code, body },
    }
}

fn parse_response(body: &str) -> Result<ResponseMessage, AiError> {
    serde_json::from_str(body)
        .map_err(|e| AiError::InvalidResponse(format!("Invalid JSON in response: {}", e)))
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    async fn complete(
        &self,
        model: &str,
        max_tokens: u32,
        messages: &[RequestMessage],
    ) -> Result<ResponseMessage, AiError> {
        let body = Self::build_request_body(model, max_tokens, messages);

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::ConnectionError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AiError::ConnectionError(format!("read body: {}", e)))?;

        if !status.is_success() {
            return Err(error_for_status(status, text));
        }

        let message = parse_response(&text)?;
        log::debug!(
            "Anthropic response {} (stop={:?}, in={}, out={})",
            message.id,
            message.stop_reason,
            message.usage.input_tokens,
            message.usage.output_tokens
        );
        Ok(message)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ContentBlock, ResponseBlock, Role};

    #[test]
    fn test_request_body_structure() {
        let messages = vec![
            RequestMessage {
                role: Role::User,
                content: vec![ContentBlock::jpeg("base64data")],
            },
            RequestMessage {
                role: Role::Assistant,
                content: vec![ContentBlock::text("A desk lamp.")],
            },
        ];

        let body = AnthropicClient::build_request_body("claude-3-haiku-20240307", 16, &messages);

        assert_eq!(body["model"], "claude-3-haiku-20240307");
        assert_eq!(body["max_tokens"], json!(16));

        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[0]["content"][0]["type"], "image");
        assert_eq!(msgs[0]["content"][0]["source"]["type"], "base64");
        assert_eq!(msgs[0]["content"][0]["source"]["media_type"], "image/jpeg");
        assert_eq!(msgs[0]["content"][0]["source"]["data"], "base64data");
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(msgs[1]["content"][0]["type"], "text");
        assert_eq!(msgs[1]["content"][0]["text"], "A desk lamp.");

        // Nothing beyond the three documented fields.
        assert_eq!(body.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_endpoint_url_construction() {
        let client = AnthropicClient::with_base_url("key", "https://api.anthropic.com/");
        assert_eq!(client.messages_url(), "https://api.anthropic.com/v1/messages");

        let client = AnthropicClient::new("key");
        assert_eq!(client.messages_url(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, "no".into()),
            AiError::AuthError(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, "no".into()),
            AiError::AuthError(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, "slow".into()),
            AiError::RateLimited(_)
        ));
        match error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "boom".into()) {
            AiError::ApiError { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-haiku-20240307",
            "content": [{"type": "text", "text": "A red mug on a desk"}],
            "stop_reason": "max_tokens",
            "stop_sequence": null,
            "usage": {"input_tokens": 1210, "output_tokens": 16}
        }"#;
        let msg = parse_response(body).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(
            msg.content,
            vec![ResponseBlock::Text {
                text: "A red mug on a desk".into()
            }]
        );
    }

    #[test]
    fn test_parse_response_invalid_json() {
        assert!(matches!(
            parse_response("not valid json{{{"),
            Err(AiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_client_name() {
        assert_eq!(AnthropicClient::new("k").name(), "anthropic");
    }
}
