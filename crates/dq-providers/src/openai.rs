use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use dq_core::{
    CompletionRequest, CompletionResponse, Error, FinishReason, Message, Provider, Role, Usage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and servers that speak the same protocol.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: Option<String>,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAIChatRequest {
        // Model priority: request > provider default. With neither, the
        // field is omitted and the server picks.
        let model = request
            .model
            .clone()
            .or_else(|| self.default_model.clone());

        OpenAIChatRequest {
            model,
            messages: request.messages.iter().map(convert_message).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.json_output.then(|| ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        }
    }

    fn parse_response(&self, response: OpenAIChatResponse) -> Result<CompletionResponse, Error> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(500, "No choices in response"))?;

        let text = choice.message.content.unwrap_or_default();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        if finish_reason == FinishReason::ContentFilter && text.trim().is_empty() {
            return Err(Error::safety_rejected("response withheld by content filter"));
        }

        let usage = response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            usage,
            model: response.model,
            finish_reason,
        })
    }

    fn parse_error(&self, status: u16, body: &str) -> Error {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: ErrorDetail,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            message: String,
            #[serde(rename = "type", default)]
            error_type: Option<String>,
            #[serde(default)]
            code: Option<serde_json::Value>,
        }

        let (message, kind) = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(err) => {
                let code = err
                    .error
                    .code
                    .as_ref()
                    .and_then(|c| c.as_str())
                    .unwrap_or_default()
                    .to_string();
                let kind = err.error.error_type.unwrap_or(code);
                (err.error.message, kind)
            }
            Err(_) => (body.to_string(), String::new()),
        };

        match status {
            503 | 529 => Error::overloaded(message),
            401 | 403 => Error::credentials(message),
            429 if kind == "insufficient_quota" => Error::quota_exceeded(message),
            429 => Error::overloaded(message),
            400 => Error::invalid_request(message),
            _ => Error::provider(status, message),
        }
    }
}

fn convert_message(message: &Message) -> OpenAIMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    OpenAIMessage {
        role: role.to_string(),
        content: Some(message.content.clone()),
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        let api_request = self.build_request(&request);
        debug!(
            model = ?api_request.model,
            message_count = api_request.messages.len(),
            json_output = request.json_output,
            "OpenAI request"
        );
        trace!(request = %serde_json::to_string(&api_request).unwrap_or_default(), "OpenAI request payload");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %error_text, "OpenAI request failed");
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| Error::network(e.to_string()))?;
        let api_response: OpenAIChatResponse = serde_json::from_str(&response_text)?;

        let parsed = self.parse_response(api_response)?;
        debug!(
            model = %parsed.model,
            finish_reason = ?parsed.finish_reason,
            content_len = parsed.text.len(),
            "OpenAI response"
        );
        Ok(parsed)
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn provider_for(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new("test-key")
            .with_base_url(server.base_url())
            .with_default_model("test-model")
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::new("test-key");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), None);
    }

    #[test]
    fn test_build_request() {
        let provider = OpenAIProvider::new("test-key").with_default_model("test-model");
        let request = CompletionRequest::from_prompt("Hello")
            .with_temperature(0.2)
            .with_json_output(true);
        let body = serde_json::to_value(provider.build_request(&request)).unwrap();

        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_build_request_no_model() {
        let provider = OpenAIProvider::new("test-key");
        let request = CompletionRequest::from_prompt("Hello");
        let body = serde_json::to_value(provider.build_request(&request)).unwrap();

        assert!(body.get("model").is_none());
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_error_classification() {
        let provider = OpenAIProvider::new("test-key");

        let bad_key = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert!(matches!(provider.parse_error(401, bad_key), Error::Credentials(_)));

        let quota = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        assert!(matches!(provider.parse_error(429, quota), Error::QuotaExceeded(_)));

        let rate = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
        assert!(matches!(provider.parse_error(429, rate), Error::Overloaded(_)));

        assert!(matches!(provider.parse_error(503, "busy"), Error::Overloaded(_)));
        assert!(matches!(provider.parse_error(400, "{}"), Error::InvalidRequest(_)));
        assert!(matches!(
            provider.parse_error(502, "bad gateway"),
            Error::Provider { status: 502, .. }
        ));
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer test-key");
                then.status(200).json_body(json!({
                    "model": "test-model",
                    "choices": [{
                        "message": {"role": "assistant", "content": "{\"answer\":\"Blue\"}"},
                        "finish_reason": "stop"
                    }],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
                }));
            })
            .await;

        let response = provider_for(&server)
            .complete(CompletionRequest::from_prompt("What color is the sky?"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, r#"{"answer":"Blue"}"#);
        assert_eq!(response.usage.total_tokens, 14);
    }

    #[tokio::test]
    async fn test_complete_content_filter() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({
                    "model": "test-model",
                    "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "content_filter"}]
                }));
            })
            .await;

        let err = provider_for(&server)
            .complete(CompletionRequest::from_prompt("Something unsafe?"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SafetyRejected(_)));
    }

    #[tokio::test]
    async fn test_complete_malformed_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).body("not json");
            })
            .await;

        let err = provider_for(&server)
            .complete(CompletionRequest::from_prompt("Hello there"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
