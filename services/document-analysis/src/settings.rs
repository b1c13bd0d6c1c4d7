//! Analysis Settings
//!
//! Everything one analysis run needs from configuration, built once per
//! config load and shared by reference.

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use lexbid_utils::classification::{FusionEngine, KeywordClassifier, PromptEngine};
use lexbid_utils::{AiConfig, AppConfig, ClassificationConfig, OcrConfig, VisionConfig};

use crate::ai_client::{AiClient, AiEndpoint};
use crate::learning::LearningStore;
use crate::ocr_client::OcrClient;

pub struct AnalysisSettings {
    pub ai: AiConfig,
    pub vision: VisionConfig,
    pub ocr: OcrConfig,
    pub classification: ClassificationConfig,
    pub fusion: FusionEngine,
    pub keywords: KeywordClassifier,
    pub prompts: PromptEngine,
    pub learning: LearningStore,
    pub text_client: Option<AiClient>,
    pub vision_client: Option<AiClient>,
    pub ocr_client: Option<OcrClient>,
}

impl AnalysisSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let classification = config.classification.clone();

        let text_client = if config.ai.enabled && config.ai.is_configured() {
            let endpoint = AiEndpoint::from_text_config(&config.ai)?;
            Some(AiClient::new(
                endpoint,
                config.ai.max_tokens,
                config.ai.temperature,
                Duration::from_secs(config.ai.timeout_seconds),
            )?)
        } else {
            info!("AI text analysis disabled or not configured");
            None
        };

        let vision_client = if config.ai.enabled && config.vision.enabled {
            let endpoint = AiEndpoint::from_vision_config(&config.vision, &config.ai)?;
            if endpoint.is_usable() {
                Some(AiClient::new(
                    endpoint,
                    config.ai.max_tokens,
                    config.ai.temperature,
                    Duration::from_secs(config.vision.timeout_seconds),
                )?)
            } else {
                warn!("Vision analysis enabled but no API key configured");
                None
            }
        } else {
            None
        };

        let ocr_client = match (config.ocr.enabled, config.ocr.endpoint.as_deref()) {
            (true, Some(endpoint)) if !endpoint.is_empty() => Some(OcrClient::new(
                endpoint,
                config.ocr.api_key.clone(),
                Duration::from_secs(config.ocr.timeout_seconds),
            )?),
            (true, _) => {
                warn!("OCR enabled but no endpoint configured");
                None
            }
            _ => None,
        };

        Ok(Self {
            fusion: FusionEngine::new(classification.fusion.clone()),
            keywords: KeywordClassifier::from_config(&classification.document_types),
            prompts: PromptEngine::new(&classification),
            learning: LearningStore::new(&classification.learning_file),
            ai: config.ai.clone(),
            vision: config.vision.clone(),
            ocr: config.ocr.clone(),
            classification,
            text_client,
            vision_client,
            ocr_client,
        })
    }

    pub fn status(&self) -> AiStatus {
        AiStatus {
            ai_enabled: self.text_client.is_some(),
            provider: self.ai.provider.clone(),
            model: self.ai.model.clone(),
            base_url: self.ai.base_url.clone(),
            vision_enabled: self.vision_client.is_some(),
            vision_provider: self.vision_client.as_ref().map(|c| c.endpoint().provider.to_string()),
            vision_model: self.vision_client.as_ref().map(|c| c.endpoint().model.clone()),
            ocr_enabled: self.ocr_client.is_some(),
            ocr_endpoint: self.ocr_client.as_ref().map(|c| c.endpoint().to_string()),
            learning_file: self.learning.path().display().to_string(),
            lawyer_override_enabled: self.classification.fusion.enable_lawyer_override,
            configured_document_types: self.classification.document_types.len(),
            business_fields: self.classification.business_fields.values().filter(|f| f.is_active).count(),
            review_threshold: self.classification.review_threshold,
        }
    }
}

/// What the running service can currently do.
#[derive(Debug, Clone, Serialize)]
pub struct AiStatus {
    pub ai_enabled: bool,
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub vision_enabled: bool,
    pub vision_provider: Option<String>,
    pub vision_model: Option<String>,
    pub ocr_enabled: bool,
    pub ocr_endpoint: Option<String>,
    pub learning_file: String,
    pub lawyer_override_enabled: bool,
    pub configured_document_types: usize,
    pub business_fields: usize,
    pub review_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_ai_builds_no_clients() {
        let mut config = AppConfig::default();
        config.ai.api_key = String::new();
        config.ai.provider = "openai".to_string();

        let settings = AnalysisSettings::from_config(&config).unwrap();
        assert!(settings.text_client.is_none());
        assert!(settings.vision_client.is_none());
        assert!(settings.ocr_client.is_none());

        let status = settings.status();
        assert!(!status.ai_enabled);
        assert_eq!(status.business_fields, 11);
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut config = AppConfig::default();
        config.ai.enabled = true;
        config.ai.provider = "ollama".to_string();
        config.ai.base_url = "http://localhost:11434/v1".to_string();
        config.ai.api_key = String::new();
        config.vision.enabled = true;

        let settings = AnalysisSettings::from_config(&config).unwrap();
        assert!(settings.text_client.is_some());
        assert_eq!(settings.status().vision_provider.as_deref(), Some("ollama"));
    }

    #[test]
    fn test_ocr_requires_endpoint() {
        let mut config = AppConfig::default();
        config.ocr.enabled = true;
        assert!(AnalysisSettings::from_config(&config).unwrap().ocr_client.is_none());

        config.ocr.endpoint = Some("http://ocr.local/recognize".to_string());
        assert!(AnalysisSettings::from_config(&config).unwrap().ocr_client.is_some());
    }

    #[test]
    fn test_unknown_provider_fails() {
        let mut config = AppConfig::default();
        config.ai.enabled = true;
        config.ai.provider = "gemini".to_string();
        config.ai.api_key = "key".to_string();
        assert!(AnalysisSettings::from_config(&config).is_err());
    }
}
