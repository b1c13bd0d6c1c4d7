//! OCR Client
//!
//! Posts raw document bytes to an HTTP OCR service and reads back the text.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OcrClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OcrClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Recognise text in an image or scanned PDF.
    pub async fn recognize(&self, data: &[u8]) -> Result<String> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .body(data.to_vec());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("Failed to call OCR service")?;
        let status = response.status();
        let body = response.text().await.context("Failed to read OCR response")?;

        if !status.is_success() {
            anyhow::bail!("OCR failed ({}): {}", status, body);
        }

        Ok(ocr_text(&body))
    }
}

/// Text from an OCR reply: `{"text": ...}`, `{"lines": [{"text": ...}]}`,
/// or the raw body when it is not JSON.
fn ocr_text(body: &str) -> String {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.trim().to_string(),
    };

    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return text.to_string();
    }

    if let Some(lines) = value.get("lines").and_then(Value::as_array) {
        return lines
            .iter()
            .filter_map(|line| line.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
    }

    String::new()
}
