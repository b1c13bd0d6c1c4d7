//! # Lexbid Core Domain Models
//!
//! Types shared by the document analysis service and its storage layer.
//!
//! ## Key Models
//!
//! - **ClassificationResult**: one classification attempt from a single source
//!   (text extraction, OCR, vision model, AI text model)
//! - **FusedResult**: the reconciled classification chosen from those attempts
//! - **AnalysisRecord**: a fused result persisted against a document
//! - **AiTask**: status tracking for an analysis run
//! - **UserCorrection**: a manual correction kept for prompt learning

pub mod classification;
pub mod document;
pub mod task;


pub use classification::*;
pub use document::*;
pub use task::*;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_category_aliases() {
        assert_eq!(DocumentCategory::from_label("performance"), Some(DocumentCategory::PerformanceContract));
        assert_eq!(DocumentCategory::from_label(" Award "), Some(DocumentCategory::AwardCertificate));
        assert_eq!(DocumentCategory::from_label("unknown"), Some(DocumentCategory::Other));
        assert_eq!(DocumentCategory::from_label("   "), None);
    }

    #[test]
    fn test_classification_result_lenient_category() {
        let result: ClassificationResult = serde_json::from_str(
            r#"{"category": "", "confidence": 0.8}"#,
        ).unwrap();
        assert!(result.category.is_none());

        let result: ClassificationResult = serde_json::from_str(
            r#"{"category": "lawyer_certificate", "confidence": 0.8, "source": "vision"}"#,
        ).unwrap();
        assert_eq!(result.category, Some(DocumentCategory::LawyerCertificate));
        assert_eq!(result.source, Some(AnalysisSource::Vision));
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn test_fusion_source_labels() {
        assert_eq!(FusionSource::Consensus(2).label(), "consensus_2_sources");
        assert_eq!(FusionSource::BestOf(3).label(), "best_of_3_sources");
        assert_eq!(FusionSource::parse("best_of_3_sources"), Some(FusionSource::BestOf(3)));
        assert_eq!(FusionSource::parse("consensus_x_sources"), None);

        let json = serde_json::to_string(&FusionSource::Consensus(4)).unwrap();
        assert_eq!(json, "\"consensus_4_sources\"");
    }

    #[test]
    fn test_fused_result_failed() {
        let fused = FusedResult::failed("boom");
        assert_eq!(fused.category, DocumentCategory::Other);
        assert_eq!(fused.confidence, 0.0);
        assert_eq!(fused.source, FusionSource::Error);
        assert!(fused.needs_review(0.7));
    }

    #[test]
    fn test_analysis_record_round_trip() {
        let mut fused = FusedResult::from_result(
            &ClassificationResult::new(DocumentCategory::AwardCertificate, 0.75)
                .with_description("2023年度优秀律师事务所"),
            FusionSource::BestOf(2),
        );
        fused.analysis_sources = vec![AnalysisSource::TextExtraction, AnalysisSource::AiText];

        let record = AnalysisRecord::new(Uuid::new_v4(), "award.pdf", "abc123", &fused);
        assert_eq!(record.category, "award_certificate");
        assert_eq!(record.fusion_source, "best_of_2_sources");
        assert_eq!(record.fused_result(), Some(fused));
    }

    #[test]
    fn test_file_kind() {
        assert_eq!(FileKind::from_filename("证书.PDF"), FileKind::Pdf);
        assert_eq!(FileKind::from_filename("scan.jpeg"), FileKind::Image);
        assert_eq!(FileKind::from_filename("notes.txt"), FileKind::Text);
        assert_eq!(FileKind::from_filename("archive"), FileKind::Unsupported);
        assert_eq!(FileKind::image_mime("a.PNG"), "image/png");
    }

    #[test]
    fn test_task_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Failed.is_terminal());

        let task = AiTask::new(Uuid::new_v4(), "document_analysis");
        assert_eq!(task.status(), Some(TaskStatus::Pending));
    }
}
