use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Document categories a bid document can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    PerformanceContract,
    AwardCertificate,
    QualificationCertificate,
    LawyerCertificate,
    Other,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 5] = [
        DocumentCategory::PerformanceContract,
        DocumentCategory::AwardCertificate,
        DocumentCategory::QualificationCertificate,
        DocumentCategory::LawyerCertificate,
        DocumentCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerformanceContract => "performance_contract",
            Self::AwardCertificate => "award_certificate",
            Self::QualificationCertificate => "qualification_certificate",
            Self::LawyerCertificate => "lawyer_certificate",
            Self::Other => "other",
        }
    }

    /// Human readable label used in generated descriptions.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PerformanceContract => "法律服务合同",
            Self::AwardCertificate => "获奖证书",
            Self::QualificationCertificate => "资质证照",
            Self::LawyerCertificate => "律师执业证书",
            Self::Other => "其他文档",
        }
    }

    /// Lenient parse of a label produced by a model or a client.
    ///
    /// Empty labels carry no category and yield `None`. Known aliases map to
    /// their category and anything else non-empty becomes `Other`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        let category = match normalized.as_str() {
            "performance_contract" | "performance" | "contract" => Self::PerformanceContract,
            "award_certificate" | "award" => Self::AwardCertificate,
            "qualification_certificate" | "qualification" => Self::QualificationCertificate,
            "lawyer_certificate" | "lawyer" => Self::LawyerCertificate,
            _ => Self::Other,
        };
        Some(category)
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent channel that produced a classification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    TextExtraction,
    Ocr,
    Vision,
    AiText,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextExtraction => "text_extraction",
            Self::Ocr => "ocr",
            Self::Vision => "vision",
            Self::AiText => "ai_text",
        }
    }
}

impl fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn deserialize_category<'de, D>(deserializer: D) -> Result<Option<DocumentCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label.as_deref().and_then(DocumentCategory::from_label))
}

/// One classification attempt from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default, deserialize_with = "deserialize_category")]
    pub category: Option<DocumentCategory>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AnalysisSource>,
}

impl ClassificationResult {
    pub fn new(category: DocumentCategory, confidence: f64) -> Self {
        Self {
            category: Some(category),
            confidence,
            description: String::new(),
            keywords: Vec::new(),
            business_field: None,
            year: None,
            source: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: AnalysisSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_business_field(mut self, business_field: impl Into<String>) -> Self {
        self.business_field = Some(business_field.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

#[derive(Debug, Error)]
#[error("unrecognised fusion source label: {0}")]
pub struct FusionSourceParseError(pub String);

/// Provenance of a fused classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FusionSource {
    /// No usable input results.
    None,
    /// Fusion failed internally.
    Error,
    /// Picked by the lawyer-certificate keyword override.
    LawyerCertificateKeywords,
    /// Boosted because this many results agreed on the category.
    Consensus(usize),
    /// Highest confidence out of this many results.
    BestOf(usize),
}

impl FusionSource {
    pub fn label(&self) -> String {
        match self {
            Self::None => "none".to_string(),
            Self::Error => "error".to_string(),
            Self::LawyerCertificateKeywords => "lawyer_certificate_keywords".to_string(),
            Self::Consensus(n) => format!("consensus_{}_sources", n),
            Self::BestOf(n) => format!("best_of_{}_sources", n),
        }
    }

    /// Short metric label without the source count.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Error => "error",
            Self::LawyerCertificateKeywords => "lawyer_certificate_keywords",
            Self::Consensus(_) => "consensus",
            Self::BestOf(_) => "best_of",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "none" => return Some(Self::None),
            "error" => return Some(Self::Error),
            "lawyer_certificate_keywords" => return Some(Self::LawyerCertificateKeywords),
            _ => {}
        }

        let count = |prefix: &str| {
            label
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix("_sources"))
                .and_then(|n| n.parse::<usize>().ok())
        };

        count("consensus_")
            .map(Self::Consensus)
            .or_else(|| count("best_of_").map(Self::BestOf))
    }
}

impl fmt::Display for FusionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<FusionSource> for String {
    fn from(source: FusionSource) -> Self {
        source.label()
    }
}

impl TryFrom<String> for FusionSource {
    type Error = FusionSourceParseError;

    fn try_from(value: String) -> Result<Self, FusionSourceParseError> {
        FusionSource::parse(&value).ok_or(FusionSourceParseError(value))
    }
}

/// The single reconciled classification for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub category: DocumentCategory,
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub source: FusionSource,
    #[serde(default)]
    pub analysis_sources: Vec<AnalysisSource>,
    #[serde(default)]
    pub suggested_tags: Vec<String>,
    #[serde(default)]
    pub key_entities: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FusedResult {
    /// Result for an analysis that produced nothing to fuse.
    pub fn empty() -> Self {
        Self {
            category: DocumentCategory::Other,
            confidence: 0.0,
            description: String::new(),
            keywords: Vec::new(),
            business_field: None,
            year: None,
            source: FusionSource::None,
            analysis_sources: Vec::new(),
            suggested_tags: Vec::new(),
            key_entities: BTreeMap::new(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            source: FusionSource::Error,
            error: Some(message.into()),
            ..Self::empty()
        }
    }

    /// Build from a chosen input result, keeping its content.
    pub fn from_result(result: &ClassificationResult, source: FusionSource) -> Self {
        Self {
            category: result.category.unwrap_or(DocumentCategory::Other),
            confidence: result.confidence,
            description: result.description.clone(),
            keywords: result.keywords.clone(),
            business_field: result.business_field.clone(),
            year: result.year,
            source,
            analysis_sources: Vec::new(),
            suggested_tags: Vec::new(),
            key_entities: BTreeMap::new(),
            error: None,
        }
    }

    pub fn needs_review(&self, threshold: f64) -> bool {
        self.error.is_some() || self.confidence < threshold
    }
}

impl From<FusedResult> for ClassificationResult {
    fn from(fused: FusedResult) -> Self {
        Self {
            category: Some(fused.category),
            confidence: fused.confidence,
            description: fused.description,
            keywords: fused.keywords,
            business_field: fused.business_field,
            year: fused.year,
            source: fused.analysis_sources.first().copied(),
        }
    }
}
