use lexbid_models::{AnalysisSource, ClassificationResult, DocumentCategory, FusedResult, FusionSource};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_LAWYER_KEYWORDS: [&str; 8] = [
    "律师执业证",
    "执业证书",
    "执业证号",
    "司法局",
    "证书编号",
    "律师证",
    "执业编号",
    "执业机构",
];

/// Thresholds and keyword set used when reconciling classification attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Best confidence below this triggers the consensus check.
    pub consensus_threshold: f64,
    pub consensus_boost: f64,
    pub consensus_cap: f64,
    pub enable_lawyer_override: bool,
    pub lawyer_keywords: Vec<String>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: 0.7,
            consensus_boost: 0.2,
            consensus_cap: 0.9,
            enable_lawyer_override: true,
            lawyer_keywords: DEFAULT_LAWYER_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FusionError {
    #[error("result {index} has invalid confidence {value}")]
    InvalidConfidence { index: usize, value: f64 },
}

#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
    lowered_keywords: Vec<String>,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        let lowered_keywords = config
            .lawyer_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            config,
            lowered_keywords,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Reconcile classification attempts into one result. Never fails: internal
    /// errors come back as an `error`-sourced result.
    pub fn fuse<'a, I>(&self, results: I) -> FusedResult
    where
        I: IntoIterator<Item = &'a ClassificationResult>,
    {
        match self.try_fuse(results) {
            Ok(fused) => fused,
            Err(e) => {
                warn!(error = %e, "Classification fusion failed");
                FusedResult::failed(e.to_string())
            }
        }
    }

    pub fn try_fuse<'a, I>(&self, results: I) -> Result<FusedResult, FusionError>
    where
        I: IntoIterator<Item = &'a ClassificationResult>,
    {
        let mut pool: Vec<&ClassificationResult> = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            if result.category.is_none() {
                continue;
            }
            if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
                return Err(FusionError::InvalidConfidence {
                    index,
                    value: result.confidence,
                });
            }
            pool.push(result);
        }

        if pool.is_empty() {
            return Ok(FusedResult::empty());
        }

        let analysis_sources = distinct_sources(&pool);

        if self.config.enable_lawyer_override {
            if let Some(matched) = self.lawyer_match(&pool) {
                let mut fused = FusedResult::from_result(matched, FusionSource::LawyerCertificateKeywords);
                fused.category = DocumentCategory::LawyerCertificate;
                fused.suggested_tags = lawyer_tags(&matched.description);
                fused.analysis_sources = analysis_sources;
                debug!(confidence = fused.confidence, "Lawyer certificate keywords matched");
                return Ok(fused);
            }
        }

        // Stable sort keeps input order among equal confidences.
        let mut ranked = pool.clone();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let best = ranked[0];

        if best.confidence < self.config.consensus_threshold {
            if let Some((member, agreeing)) = consensus(&ranked) {
                let mut fused = FusedResult::from_result(member, FusionSource::Consensus(agreeing));
                fused.confidence = (member.confidence + self.config.consensus_boost).min(self.config.consensus_cap);
                fused.analysis_sources = analysis_sources;
                debug!(
                    category = %fused.category,
                    agreeing,
                    confidence = fused.confidence,
                    "Consensus boost applied"
                );
                return Ok(fused);
            }
        }

        let mut fused = FusedResult::from_result(best, FusionSource::BestOf(pool.len()));
        fused.analysis_sources = analysis_sources;
        Ok(fused)
    }

    fn lawyer_match<'a>(&self, pool: &[&'a ClassificationResult]) -> Option<&'a ClassificationResult> {
        let mut chosen: Option<&ClassificationResult> = None;
        for result in pool.iter().copied() {
            if !self.mentions_lawyer_certificate(result) {
                continue;
            }
            match chosen {
                Some(current) if current.confidence >= result.confidence => {}
                _ => chosen = Some(result),
            }
        }
        chosen
    }

    fn mentions_lawyer_certificate(&self, result: &ClassificationResult) -> bool {
        let mut haystack = result.description.to_lowercase();
        for keyword in &result.keywords {
            haystack.push(' ');
            haystack.push_str(&keyword.to_lowercase());
        }
        self.lowered_keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

fn distinct_sources(pool: &[&ClassificationResult]) -> Vec<AnalysisSource> {
    let mut sources = Vec::new();
    for source in pool.iter().filter_map(|r| r.source) {
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

fn lawyer_tags(description: &str) -> Vec<String> {
    ["律师", "合伙人"]
        .iter()
        .filter(|tag| description.contains(*tag))
        .map(|tag| tag.to_string())
        .collect()
}

/// Category with the most agreeing results (at least two), and its
/// highest-confidence member. `ranked` must be sorted by confidence descending,
/// so ties between categories go to the one with the stronger top result.
fn consensus<'a>(ranked: &[&'a ClassificationResult]) -> Option<(&'a ClassificationResult, usize)> {
    let mut tally: Vec<(DocumentCategory, usize, &ClassificationResult)> = Vec::new();
    for result in ranked.iter().copied() {
        let Some(category) = result.category else { continue };
        match tally.iter_mut().find(|(c, _, _)| *c == category) {
            Some(entry) => entry.1 += 1,
            None => tally.push((category, 1, result)),
        }
    }

    let mut winner: Option<(&ClassificationResult, usize)> = None;
    for (_, count, member) in tally {
        if count < 2 {
            continue;
        }
        match winner {
            Some((_, best)) if best >= count => {}
            _ => winner = Some((member, count)),
        }
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(category: DocumentCategory, confidence: f64) -> ClassificationResult {
        ClassificationResult::new(category, confidence)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_input() {
        let engine = FusionEngine::default();
        let inputs: Vec<ClassificationResult> = Vec::new();
        let fused = engine.fuse(&inputs);
        assert_eq!(fused.category, DocumentCategory::Other);
        assert_eq!(fused.confidence, 0.0);
        assert_eq!(fused.source, FusionSource::None);
    }

    #[test]
    fn test_results_without_category_are_skipped() {
        let engine = FusionEngine::new(FusionConfig::default());
        let mut blank = result(DocumentCategory::AwardCertificate, 0.9);
        blank.category = None;

        let fused = engine.fuse([&blank]);
        assert_eq!(fused.source, FusionSource::None);

        let kept = result(DocumentCategory::PerformanceContract, 0.4);
        let fused = engine.fuse([&blank, &kept]);
        assert_eq!(fused.category, DocumentCategory::PerformanceContract);
        assert_eq!(fused.source, FusionSource::BestOf(1));
    }

    #[test]
    fn test_consensus_example() {
        let engine = FusionEngine::new(FusionConfig::default());
        let inputs = vec![
            result(DocumentCategory::AwardCertificate, 0.5),
            result(DocumentCategory::AwardCertificate, 0.4),
            result(DocumentCategory::Other, 0.3),
        ];

        let fused = engine.fuse(&inputs);
        assert_eq!(fused.category, DocumentCategory::AwardCertificate);
        assert!(close(fused.confidence, 0.7));
        assert!(fused.source.label().starts_with("consensus_"));
        assert_eq!(fused.source, FusionSource::Consensus(2));
    }

    #[test]
    fn test_consensus_picks_agreeing_category_over_top() {
        let engine = FusionEngine::default();
        let inputs = vec![
            result(DocumentCategory::Other, 0.6),
            result(DocumentCategory::PerformanceContract, 0.5)
                .with_description("法律服务合同"),
            result(DocumentCategory::PerformanceContract, 0.45),
        ];

        let fused = engine.fuse(&inputs);
        assert_eq!(fused.category, DocumentCategory::PerformanceContract);
        assert_eq!(fused.description, "法律服务合同");
        assert!(close(fused.confidence, 0.7));
    }

    #[test]
    fn test_consensus_boost_is_capped() {
        let engine = FusionEngine::new(FusionConfig {
            consensus_threshold: 0.9,
            ..FusionConfig::default()
        });
        let inputs = vec![
            result(DocumentCategory::AwardCertificate, 0.85),
            result(DocumentCategory::AwardCertificate, 0.8),
        ];

        let fused = engine.fuse(&inputs);
        assert!(close(fused.confidence, 0.9));
    }

    #[test]
    fn test_confident_best_is_returned_unchanged() {
        let engine = FusionEngine::default();
        let best = result(DocumentCategory::QualificationCertificate, 0.85)
            .with_description("律师事务所执业许可证")
            .with_keywords(["许可证"])
            .with_year(2023)
            .with_source(AnalysisSource::Vision);
        let inputs = vec![
            result(DocumentCategory::AwardCertificate, 0.6).with_source(AnalysisSource::TextExtraction),
            result(DocumentCategory::AwardCertificate, 0.5).with_source(AnalysisSource::TextExtraction),
            best.clone(),
        ];

        let fused = engine.fuse(&inputs);
        assert_eq!(fused.category, DocumentCategory::QualificationCertificate);
        assert_eq!(fused.confidence, 0.85);
        assert_eq!(fused.description, best.description);
        assert_eq!(fused.year, Some(2023));
        assert_eq!(fused.source, FusionSource::BestOf(3));
        assert_eq!(
            fused.analysis_sources,
            vec![AnalysisSource::TextExtraction, AnalysisSource::Vision]
        );
    }

    #[test]
    fn test_lawyer_override() {
        let engine = FusionEngine::default();
        let inputs = vec![
            result(DocumentCategory::AwardCertificate, 0.95),
            result(DocumentCategory::Other, 0.3).with_description("某某律师事务所合伙人，执业证号 11101200910123456"),
            result(DocumentCategory::Other, 0.2).with_keywords(["司法局"]),
        ];

        let fused = engine.fuse(&inputs);
        assert_eq!(fused.category, DocumentCategory::LawyerCertificate);
        assert_eq!(fused.confidence, 0.3);
        assert_eq!(fused.source, FusionSource::LawyerCertificateKeywords);
        assert_eq!(fused.suggested_tags, vec!["律师".to_string(), "合伙人".to_string()]);
    }

    #[test]
    fn test_lawyer_override_can_be_disabled() {
        let engine = FusionEngine::new(FusionConfig {
            enable_lawyer_override: false,
            ..FusionConfig::default()
        });
        let inputs = vec![
            result(DocumentCategory::AwardCertificate, 0.95),
            result(DocumentCategory::Other, 0.3).with_keywords(["执业证书"]),
        ];

        let fused = engine.fuse(&inputs);
        assert_eq!(fused.category, DocumentCategory::AwardCertificate);
    }

    #[test]
    fn test_lawyer_keywords_match_case_insensitively() {
        let engine = FusionEngine::new(FusionConfig {
            lawyer_keywords: vec!["Bar Licence".to_string()],
            ..FusionConfig::default()
        });
        let input = result(DocumentCategory::Other, 0.4).with_description("scanned BAR LICENCE page");

        let fused = engine.fuse([&input]);
        assert_eq!(fused.category, DocumentCategory::LawyerCertificate);
    }

    #[test]
    fn test_invalid_confidence_becomes_error_result() {
        let engine = FusionEngine::default();
        let inputs = vec![
            result(DocumentCategory::AwardCertificate, 0.5),
            result(DocumentCategory::AwardCertificate, f64::NAN),
        ];

        assert!(matches!(
            engine.try_fuse(&inputs),
            Err(FusionError::InvalidConfidence { index: 1, .. })
        ));

        let fused = engine.fuse(&inputs);
        assert_eq!(fused.source, FusionSource::Error);
        assert_eq!(fused.category, DocumentCategory::Other);
        assert!(fused.error.is_some());
    }

    #[test]
    fn test_optional_slots_flatten() {
        let engine = FusionEngine::default();
        let slots = [
            Some(result(DocumentCategory::PerformanceContract, 0.8)),
            None,
            None,
            Some(result(DocumentCategory::Other, 0.2)),
        ];

        let fused = engine.fuse(slots.iter().flatten());
        assert_eq!(fused.category, DocumentCategory::PerformanceContract);
        assert_eq!(fused.source, FusionSource::BestOf(2));
    }
}
