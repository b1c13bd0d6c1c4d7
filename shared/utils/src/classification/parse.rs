use lexbid_models::{ClassificationResult, DocumentCategory};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::keywords::{extract_year, KeywordClassifier};

static JSON_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid json block regex"));

/// Outcome of reading a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// The reply carried a JSON object with a usable category.
    Structured(ClassificationResult),
    /// No usable JSON; classified by keywords over the raw reply.
    KeywordFallback(ClassificationResult),
}

impl ParsedReply {
    pub fn into_result(self) -> ClassificationResult {
        match self {
            Self::Structured(result) | Self::KeywordFallback(result) => result,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Parse a classification reply, falling back to keyword matching when the
/// reply has no JSON object or the object names no category.
pub fn parse_classification_reply(reply: &str, fallback: &KeywordClassifier) -> ParsedReply {
    match parse_json_reply(reply) {
        Some(result) => ParsedReply::Structured(result),
        None => ParsedReply::KeywordFallback(fallback.classify(reply)),
    }
}

fn parse_json_reply(reply: &str) -> Option<ClassificationResult> {
    let block = JSON_BLOCK.find(reply)?;
    let value: Value = serde_json::from_str(block.as_str()).ok()?;
    let object = value.as_object()?;

    let label = first_string(&value, &["category", "document_type", "type"])?;
    let category = DocumentCategory::from_label(&label)?;

    let confidence = object
        .get("confidence")
        .and_then(number_or_string)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.5);

    let mut result = ClassificationResult::new(category, confidence);
    if let Some(description) = first_string(&value, &["description", "analysis_summary", "classification_reasoning"]) {
        result.description = description;
    }
    result.keywords = first_string_list(&value, &["keywords", "keywords_found"]);
    result.business_field = first_string(&value, &["business_field"]).filter(|f| !f.trim().is_empty());
    result.year = object
        .get("year")
        .and_then(number_or_string)
        .map(|y| y as i32)
        .filter(|y| (1900..=2100).contains(y))
        .or_else(|| extract_year(&result.description));

    Some(result)
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(|v| v.as_str().map(str::to_string))
}

fn first_string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_array))
        .next()
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn number_or_string(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
