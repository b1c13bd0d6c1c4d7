use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::classification::FusedResult;

/// Persisted outcome of one document analysis.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub file_name: String,
    pub content_hash: String,
    pub category: String,
    pub confidence_score: f64,
    pub fusion_source: String,
    pub ai_analysis: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(document_id: Uuid, file_name: &str, content_hash: &str, fused: &FusedResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            file_name: file_name.to_string(),
            content_hash: content_hash.to_string(),
            category: fused.category.as_str().to_string(),
            confidence_score: fused.confidence,
            fusion_source: fused.source.label(),
            ai_analysis: serde_json::to_value(fused).unwrap_or(serde_json::Value::Null),
            created_at: Utc::now(),
        }
    }

    /// Decode the stored fused result, if the JSON still matches the current shape.
    pub fn fused_result(&self) -> Option<FusedResult> {
        serde_json::from_value(self.ai_analysis.clone()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Uploaded,
    Processing,
    Analyzed,
    Failed,
    RequiresReview,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Analyzed => "analyzed",
            Self::Failed => "failed",
            Self::RequiresReview => "requires_review",
        }
    }
}

/// Coarse file kind, decided from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Pdf,
    Image,
    Text,
    Unsupported,
}

impl FileKind {
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Self::Pdf,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" | "tif" | "webp" => Self::Image,
            "txt" | "md" | "csv" | "json" => Self::Text,
            _ => Self::Unsupported,
        }
    }

    /// Image or PDF, i.e. something the vision and OCR channels can look at.
    pub fn is_visual(&self) -> bool {
        matches!(self, Self::Pdf | Self::Image)
    }

    pub fn image_mime(filename: &str) -> &'static str {
        let lower = filename.to_lowercase();
        if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".gif") {
            "image/gif"
        } else if lower.ends_with(".bmp") {
            "image/bmp"
        } else if lower.ends_with(".webp") {
            "image/webp"
        } else if lower.ends_with(".tif") || lower.ends_with(".tiff") {
            "image/tiff"
        } else {
            "image/jpeg"
        }
    }
}
