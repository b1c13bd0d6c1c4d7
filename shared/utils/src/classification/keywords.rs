use lexbid_models::{ClassificationResult, DocumentCategory};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::{BusinessFieldConfig, DocumentTypeConfig};

static YEAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"20\d{2}").expect("valid year regex"));

const QUALIFICATION_KEYWORDS: &[&str] = &[
    "执业许可证",
    "营业执照",
    "律师事务所执业",
    "机构证照",
    "资质证书",
    "资质",
    "许可证",
];

const AWARD_KEYWORDS: &[&str] = &[
    "获奖",
    "奖项",
    "表彰",
    "荣誉",
    "评选",
    "排名",
    "榜单",
    "优秀",
    "award",
    "ranking",
    "chambers",
    "legal 500",
];

const CONTRACT_KEYWORDS: &[&str] = &[
    "合同",
    "委托书",
    "协议书",
    "协议",
    "法律服务",
    "甲方",
    "乙方",
    "委托方",
    "受托方",
    "聘请",
    "顾问",
];

/// Lists checked in priority order; the first with any hit decides.
const FIXED_RULES: [(DocumentCategory, &[&str]); 3] = [
    (DocumentCategory::QualificationCertificate, QUALIFICATION_KEYWORDS),
    (DocumentCategory::AwardCertificate, AWARD_KEYWORDS),
    (DocumentCategory::PerformanceContract, CONTRACT_KEYWORDS),
];

pub const MAX_RECORDED_KEYWORDS: usize = 3;
pub const UNMATCHED_CONFIDENCE: f64 = 0.3;

/// First `20xx` year in the text.
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR_PATTERN.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Leading characters of the text with whitespace runs collapsed.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(max_chars).collect()
}

/// Ordered substring matching against the built-in keyword lists.
///
/// Descriptions name the category only. Document text stays out of them so
/// that incidental terms cannot reach the lawyer-certificate override.
pub fn classify_fixed(text: &str) -> ClassificationResult {
    let lowered = text.to_lowercase();

    for (category, keywords) in FIXED_RULES {
        let matched: Vec<&str> = keywords
            .iter()
            .copied()
            .filter(|k| lowered.contains(k))
            .collect();

        if matched.is_empty() {
            continue;
        }

        let confidence = (0.6 + 0.1 * (matched.len() - 1) as f64).min(0.9);
        let mut result = ClassificationResult::new(category, confidence)
            .with_description(category.display_name())
            .with_keywords(matched.into_iter().take(MAX_RECORDED_KEYWORDS));
        result.year = extract_year(text);
        return result;
    }

    let mut result = ClassificationResult::new(DocumentCategory::Other, UNMATCHED_CONFIDENCE)
        .with_description(DocumentCategory::Other.display_name());
    result.year = extract_year(text);
    result
}

/// Score-based matching against document types from configuration.
///
/// Score is the fraction of a type's keywords found in the text; the best
/// scoring type wins with confidence `min(0.95, threshold + score * (1 - threshold))`.
pub fn classify_configured(text: &str, types: &BTreeMap<String, DocumentTypeConfig>) -> ClassificationResult {
    let lowered = text.to_lowercase();
    let mut best: Option<(&str, &DocumentTypeConfig, f64, Vec<&str>)> = None;

    for (code, rule) in types {
        if rule.keywords.is_empty() {
            continue;
        }
        let matched: Vec<&str> = rule
            .keywords
            .iter()
            .map(String::as_str)
            .filter(|k| lowered.contains(&k.to_lowercase()))
            .collect();
        let score = matched.len() as f64 / rule.keywords.len() as f64;

        match &best {
            Some((_, _, best_score, _)) if *best_score >= score => {}
            _ => best = Some((code.as_str(), rule, score, matched)),
        }
    }

    let year = extract_year(text);
    match best {
        Some((code, rule, score, matched)) if score > 0.0 => {
            let threshold = rule.confidence_threshold.clamp(0.0, 1.0);
            let confidence = (threshold + score * (1.0 - threshold)).min(0.95);
            let category = DocumentCategory::from_label(code).unwrap_or(DocumentCategory::Other);
            let mut result = ClassificationResult::new(category, confidence)
                .with_description(rule.name.clone())
                .with_keywords(matched.into_iter().take(MAX_RECORDED_KEYWORDS));
            result.year = year;
            result
        }
        _ => {
            let mut result = ClassificationResult::new(DocumentCategory::Other, UNMATCHED_CONFIDENCE)
                .with_description(DocumentCategory::Other.display_name());
            result.year = year;
            result
        }
    }
}

/// Keyword classifier used for the text channels and as the fallback for
/// unparseable model replies.
#[derive(Debug, Clone)]
pub enum KeywordClassifier {
    Fixed,
    Configured(BTreeMap<String, DocumentTypeConfig>),
}

impl KeywordClassifier {
    pub fn from_config(types: &BTreeMap<String, DocumentTypeConfig>) -> Self {
        if types.is_empty() {
            Self::Fixed
        } else {
            Self::Configured(types.clone())
        }
    }

    pub fn classify(&self, text: &str) -> ClassificationResult {
        match self {
            Self::Fixed => classify_fixed(text),
            Self::Configured(types) => classify_configured(text, types),
        }
    }
}

/// Business field whose keywords cover the largest share of the text's hits.
pub fn classify_business_field(
    text: &str,
    fields: &BTreeMap<String, BusinessFieldConfig>,
) -> Option<String> {
    let lowered = text.to_lowercase();
    let mut best: Option<(&str, f64)> = None;

    for field in fields.values().filter(|f| f.is_active && !f.keywords.is_empty()) {
        let hits = field
            .keywords
            .iter()
            .filter(|k| lowered.contains(&k.to_lowercase()))
            .count();
        let score = hits as f64 / field.keywords.len() as f64;

        if score > best.map(|(_, s)| s).unwrap_or(0.0) {
            best = Some((field.name.as_str(), score));
        }
    }

    best.map(|(name, _)| name.to_string())
}
