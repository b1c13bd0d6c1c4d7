//! Lexbid Fusion Property Tests
//!
//! Properties the classification fusion engine must hold for any set of
//! per-source classification results.

use lexbid_models::{AnalysisSource, ClassificationResult, DocumentCategory, FusionSource};
use lexbid_utils::classification::{FusionConfig, FusionEngine};
use proptest::prelude::*;

fn arb_category() -> impl Strategy<Value = DocumentCategory> {
    prop::sample::select(DocumentCategory::ALL.to_vec())
}

fn arb_source() -> impl Strategy<Value = AnalysisSource> {
    prop_oneof![
        Just(AnalysisSource::TextExtraction),
        Just(AnalysisSource::Ocr),
        Just(AnalysisSource::Vision),
        Just(AnalysisSource::AiText),
    ]
}

prop_compose! {
    /// A result whose text never mentions any lawyer-certificate keyword.
    fn arb_plain_result(range: std::ops::Range<f64>)(
        category in arb_category(),
        confidence in range,
        description in "[a-z ]{0,30}",
        source in prop::option::of(arb_source()),
    ) -> ClassificationResult {
        let mut result = ClassificationResult::new(category, confidence).with_description(description);
        result.source = source;
        result
    }
}

fn engine() -> FusionEngine {
    FusionEngine::new(FusionConfig::default())
}

// ===== Property 1: Empty Input =====

mod empty_input_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Results without a category count as absent.
        #[test]
        fn prop_uncategorised_inputs_fuse_to_other(
            confidences in prop::collection::vec(0.0..=1.0f64, 0..4),
        ) {
            let inputs: Vec<ClassificationResult> = confidences
                .into_iter()
                .map(|c| {
                    let mut r = ClassificationResult::new(DocumentCategory::AwardCertificate, c);
                    r.category = None;
                    r
                })
                .collect();

            let fused = engine().fuse(&inputs);
            prop_assert_eq!(fused.category, DocumentCategory::Other);
            prop_assert_eq!(fused.confidence, 0.0);
            prop_assert_eq!(fused.source, FusionSource::None);
        }
    }
}

// ===== Property 2: Lawyer Certificate Override =====

mod lawyer_override_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// One keyword-bearing result forces lawyer_certificate whatever the other confidences.
        #[test]
        fn prop_single_lawyer_match_wins(
            others in prop::collection::vec(arb_plain_result(0.0..1.0), 0..4),
            keyword in prop::sample::select(vec!["律师执业证", "执业证书", "执业证号", "司法局", "证书编号"]),
            in_keywords in any::<bool>(),
            confidence in 0.0..1.0f64,
            category in arb_category(),
            position in 0usize..4,
        ) {
            let mut lawyer = ClassificationResult::new(category, confidence);
            if in_keywords {
                lawyer.keywords = vec![keyword.to_string()];
            } else {
                lawyer.description = format!("扫描件 {} 第一页", keyword);
            }

            let mut inputs = others;
            let index = position.min(inputs.len());
            inputs.insert(index, lawyer);

            let fused = engine().fuse(&inputs);
            prop_assert_eq!(fused.category, DocumentCategory::LawyerCertificate);
            prop_assert_eq!(fused.source, FusionSource::LawyerCertificateKeywords);
            prop_assert_eq!(fused.confidence, confidence);
        }
    }
}

// ===== Property 3: Confident Best Result =====

mod confident_best_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A top result at or above 0.7 comes back unchanged apart from annotations.
        #[test]
        fn prop_confident_best_is_unchanged(
            best in arb_plain_result(0.7..1.0),
            others in prop::collection::vec(arb_plain_result(0.0..0.7), 0..4),
        ) {
            let mut inputs = others;
            inputs.push(best.clone());

            let fused = engine().fuse(&inputs);
            prop_assert_eq!(Some(fused.category), best.category);
            prop_assert_eq!(fused.confidence, best.confidence);
            prop_assert_eq!(&fused.description, &best.description);
            prop_assert_eq!(fused.source, FusionSource::BestOf(inputs.len()));
        }
    }
}

// ===== Property 4: Consensus Boost =====

mod consensus_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Two or more agreeing low-confidence results get the capped boost.
        #[test]
        fn prop_consensus_boost(
            category in arb_category(),
            agreeing in prop::collection::vec(0.0..0.7f64, 2..4),
        ) {
            let inputs: Vec<ClassificationResult> = agreeing
                .iter()
                .map(|c| ClassificationResult::new(category, *c))
                .collect();
            let top = agreeing.iter().cloned().fold(f64::MIN, f64::max);

            let fused = engine().fuse(&inputs);
            prop_assert_eq!(fused.category, category);
            prop_assert!((fused.confidence - (top + 0.2).min(0.9)).abs() < 1e-9);
            prop_assert_eq!(fused.source, FusionSource::Consensus(inputs.len()));
        }

        /// Fused confidence never leaves 0..=1 for valid inputs.
        #[test]
        fn prop_fused_confidence_in_range(
            inputs in prop::collection::vec(arb_plain_result(0.0..1.0), 0..5),
        ) {
            let fused = engine().fuse(&inputs);
            prop_assert!((0.0..=1.0).contains(&fused.confidence));
            prop_assert!(fused.error.is_none());
        }
    }
}

// ===== Property 5: Single Result Idempotence =====

mod idempotence_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Feeding a single fused result back through fusion keeps its category.
        #[test]
        fn prop_single_result_category_is_stable(result in arb_plain_result(0.0..1.0)) {
            let first = engine().fuse([&result]);
            let again: ClassificationResult = first.clone().into();
            let second = engine().fuse([&again]);

            prop_assert_eq!(first.category, second.category);
            prop_assert_eq!(Some(first.category), result.category);
        }
    }
}

// ===== Property 6: Keyword Results Keep Their Category =====

mod keyword_classifier_tests {
    use super::*;
    use lexbid_utils::classification::classify_fixed;

    fn arb_certificate_text() -> impl Strategy<Value = String> {
        let heading = prop::sample::select(vec!["荣誉证书", "表彰决定", "律师事务所执业许可证", "法律服务合同"]);
        let incidental = prop::sample::subsequence(
            vec!["证书编号：HR-2023-001", "发证机关：北京市司法局", "执业机构：某某律师事务所", "2021年"],
            0..=4,
        );
        (heading, incidental).prop_map(|(heading, lines)| {
            let mut text = heading.to_string();
            for line in lines {
                text.push('\n');
                text.push_str(line);
            }
            text
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Issuer and serial-number lines on a certificate never turn a
        /// keyword classification into a lawyer certificate.
        #[test]
        fn prop_incidental_terms_do_not_override(text in arb_certificate_text()) {
            let result = classify_fixed(&text);
            let fused = engine().fuse([&result]);

            prop_assert_ne!(fused.source, FusionSource::LawyerCertificateKeywords);
            prop_assert_eq!(Some(fused.category), result.category);
        }
    }
}
