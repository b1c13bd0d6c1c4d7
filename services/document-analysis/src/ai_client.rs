//! AI Client
//!
//! Chat and vision completions against OpenAI-compatible providers
//! (openai, azure, ollama, custom) and the Anthropic messages API.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use lexbid_utils::{AiConfig, VisionConfig};

const AZURE_API_VERSION: &str = "2024-02-01";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Azure,
    Ollama,
    Anthropic,
    Custom,
}

impl Provider {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "azure" => Ok(Self::Azure),
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            "custom" => Ok(Self::Custom),
            other => anyhow::bail!("Unsupported AI provider: {}", other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Azure => "azure",
            Self::Ollama => "ollama",
            Self::Anthropic => "anthropic",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to reach one model.
#[derive(Debug, Clone, PartialEq)]
pub struct AiEndpoint {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl AiEndpoint {
    pub fn from_text_config(ai: &AiConfig) -> Result<Self> {
        Ok(Self {
            provider: Provider::parse(&ai.provider)?,
            base_url: ai.base_url.trim_end_matches('/').to_string(),
            api_key: ai.api_key.clone(),
            model: ai.model.clone(),
        })
    }

    /// Vision endpoint; unset provider, URL and key come from the text settings.
    pub fn from_vision_config(vision: &VisionConfig, ai: &AiConfig) -> Result<Self> {
        let provider = vision.provider.as_deref().unwrap_or(&ai.provider);
        let base_url = vision.base_url.as_deref().unwrap_or(&ai.base_url);
        let api_key = vision.api_key.as_deref().unwrap_or(&ai.api_key);

        Ok(Self {
            provider: Provider::parse(provider)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: vision.model.clone(),
        })
    }

    /// Ollama runs without a key; everything else needs one.
    pub fn is_usable(&self) -> bool {
        self.provider == Provider::Ollama || !self.api_key.is_empty()
    }

    pub fn url(&self) -> String {
        match self.provider {
            Provider::OpenAi | Provider::Ollama | Provider::Custom => {
                format!("{}/chat/completions", self.base_url)
            }
            Provider::Azure => format!(
                "{}/{}/chat/completions?api-version={}",
                self.base_url, self.model, AZURE_API_VERSION
            ),
            Provider::Anthropic => ANTHROPIC_URL.to_string(),
        }
    }

    pub fn auth_headers(&self) -> Vec<(&'static str, String)> {
        match self.provider {
            Provider::OpenAi | Provider::Custom => {
                vec![("Authorization", format!("Bearer {}", self.api_key))]
            }
            Provider::Azure => vec![("api-key", self.api_key.clone())],
            Provider::Ollama => Vec::new(),
            Provider::Anthropic => vec![
                ("x-api-key", self.api_key.clone()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    Image { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Chat client for one configured model.
#[derive(Debug, Clone)]
pub struct AiClient {
    client: Client,
    endpoint: AiEndpoint,
    max_tokens: u32,
    temperature: f32,
}

impl AiClient {
    pub fn new(endpoint: AiEndpoint, max_tokens: u32, temperature: f32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            max_tokens,
            temperature,
        })
    }

    pub fn endpoint(&self) -> &AiEndpoint {
        &self.endpoint
    }

    pub async fn analyze_text(&self, system: &str, user: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(user));
        self.chat(&messages).await
    }

    pub async fn analyze_image(&self, prompt: &str, image: &[u8], mime: &str) -> Result<String> {
        let message = ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Image {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", mime, BASE64.encode(image)),
                    },
                },
                ContentPart::Text {
                    text: prompt.to_string(),
                },
            ]),
        };
        self.chat(&[message]).await
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = self.request_body(messages);
        let mut request = self
            .client
            .post(self.endpoint.url())
            .header("Content-Type", "application/json")
            .json(&body);
        for (name, value) in self.endpoint.auth_headers() {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to call {} API", self.endpoint.provider))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error {}: {}", self.endpoint.provider, status, error_text);
        }

        let payload: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", self.endpoint.provider))?;

        reply_text(self.endpoint.provider, &payload).context("No response content")
    }

    pub fn request_body(&self, messages: &[ChatMessage]) -> Value {
        match self.endpoint.provider {
            Provider::Anthropic => anthropic_body(&self.endpoint.model, self.max_tokens, self.temperature, messages),
            _ => json!({
                "model": self.endpoint.model,
                "messages": messages,
                "max_tokens": self.max_tokens,
                "temperature": self.temperature,
            }),
        }
    }
}

/// Anthropic takes the system prompt separately and images as base64 sources.
fn anthropic_body(model: &str, max_tokens: u32, temperature: f32, messages: &[ChatMessage]) -> Value {
    let mut system = Vec::new();
    let mut converted = Vec::new();

    for message in messages {
        if message.role == "system" {
            if let MessageContent::Text(text) = &message.content {
                system.push(text.clone());
            }
            continue;
        }

        let content = match &message.content {
            MessageContent::Text(text) => json!(text),
            MessageContent::Parts(parts) => Value::Array(parts.iter().map(anthropic_part).collect()),
        };
        converted.push(json!({ "role": message.role, "content": content }));
    }

    let mut body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": temperature,
        "messages": converted,
    });
    if !system.is_empty() {
        body["system"] = json!(system.join("\n"));
    }
    body
}

fn anthropic_part(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => json!({ "type": "text", "text": text }),
        ContentPart::Image { image_url } => {
            let (media_type, data) = image_url
                .url
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(";base64,"))
                .unwrap_or(("image/jpeg", image_url.url.as_str()));
            json!({
                "type": "image",
                "source": { "type": "base64", "media_type": media_type, "data": data },
            })
        }
    }
}

fn reply_text(provider: Provider, payload: &Value) -> Option<String> {
    match provider {
        Provider::Anthropic => {
            let text: Vec<&str> = payload
                .get("content")?
                .as_array()?
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect();
            if text.is_empty() {
                None
            } else {
                Some(text.join(""))
            }
        }
        _ => payload
            .get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(provider: Provider) -> AiEndpoint {
        AiEndpoint {
            provider,
            base_url: "https://example.test/v1".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
        }
    }

    #[test]
    fn test_provider_urls_and_headers() {
        let openai = endpoint(Provider::OpenAi);
        assert_eq!(openai.url(), "https://example.test/v1/chat/completions");
        assert_eq!(openai.auth_headers(), vec![("Authorization", "Bearer sk-test".to_string())]);

        let azure = endpoint(Provider::Azure);
        assert_eq!(
            azure.url(),
            "https://example.test/v1/gpt-4o/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(azure.auth_headers(), vec![("api-key", "sk-test".to_string())]);

        let ollama = AiEndpoint {
            api_key: String::new(),
            ..endpoint(Provider::Ollama)
        };
        assert!(ollama.auth_headers().is_empty());
        assert!(ollama.is_usable());

        let anthropic = endpoint(Provider::Anthropic);
        assert_eq!(anthropic.url(), ANTHROPIC_URL);
        assert_eq!(anthropic.auth_headers().len(), 2);
    }

    #[test]
    fn test_vision_endpoint_falls_back_to_text_settings() {
        let ai = AiConfig {
            provider: "custom".to_string(),
            base_url: "http://llm.internal/v1/".to_string(),
            api_key: "key".to_string(),
            ..AiConfig::default()
        };
        let vision = VisionConfig::default();

        let endpoint = AiEndpoint::from_vision_config(&vision, &ai).unwrap();
        assert_eq!(endpoint.provider, Provider::Custom);
        assert_eq!(endpoint.base_url, "http://llm.internal/v1");
        assert_eq!(endpoint.api_key, "key");
        assert_eq!(endpoint.model, vision.model);

        let vision = VisionConfig {
            provider: Some("ollama".to_string()),
            base_url: Some("http://localhost:11434/v1".to_string()),
            ..VisionConfig::default()
        };
        let endpoint = AiEndpoint::from_vision_config(&vision, &ai).unwrap();
        assert_eq!(endpoint.provider, Provider::Ollama);
        assert_eq!(endpoint.url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(Provider::parse("gemini").is_err());
        assert_eq!(Provider::parse(" Azure ").unwrap(), Provider::Azure);
    }

    #[test]
    fn test_anthropic_body_conversion() {
        let client = AiClient::new(endpoint(Provider::Anthropic), 1000, 0.1, Duration::from_secs(5)).unwrap();
        let messages = vec![
            ChatMessage::system("只返回JSON"),
            ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Image {
                        image_url: ImageUrl {
                            url: "data:image/png;base64,AAAA".to_string(),
                        },
                    },
                    ContentPart::Text {
                        text: "分类".to_string(),
                    },
                ]),
            },
        ];

        let body = client.request_body(&messages);
        assert_eq!(body["system"], "只返回JSON");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["content"][0]["source"]["media_type"], "image/png");
        assert_eq!(body["messages"][0]["content"][0]["source"]["data"], "AAAA");
        assert_eq!(body["messages"][0]["content"][1]["text"], "分类");
    }

    #[test]
    fn test_openai_body_keeps_messages() {
        let client = AiClient::new(endpoint(Provider::OpenAi), 4000, 0.1, Duration::from_secs(5)).unwrap();
        let body = client.request_body(&[ChatMessage::system("s"), ChatMessage::user("u")]);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "u");
    }

    #[test]
    fn test_reply_text() {
        let openai = json!({"choices": [{"message": {"content": "{\"category\": \"other\"}"}}]});
        assert_eq!(reply_text(Provider::OpenAi, &openai).as_deref(), Some("{\"category\": \"other\"}"));

        let anthropic = json!({"content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]});
        assert_eq!(reply_text(Provider::Anthropic, &anthropic).as_deref(), Some("ab"));

        assert_eq!(reply_text(Provider::OpenAi, &json!({"choices": []})), None);
    }
}
