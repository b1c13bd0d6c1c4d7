//! Regex extraction of key fields from document text, per document category.

use lexbid_models::DocumentCategory;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

struct FieldRule {
    key: &'static str,
    patterns: Vec<Regex>,
}

impl FieldRule {
    fn new(key: &'static str, labels: &[&str], value: &str) -> Self {
        let patterns = labels
            .iter()
            .map(|label| {
                Regex::new(&format!(r"{}\s*[：:]\s*({})", label, value)).expect("valid entity regex")
            })
            .collect();
        Self { key, patterns }
    }

    /// First pattern that matches wins.
    fn capture(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|v| !v.is_empty())
        })
    }
}

const TOKEN: &str = r"\S+";
const AMOUNT: &str = r"[0-9,，.万元]+";

static LAWYER_RULES: LazyLock<Vec<FieldRule>> = LazyLock::new(|| {
    vec![
        FieldRule::new("holder_name", &[r"姓\s*名", "律师姓名", "执业者", "持有人"], TOKEN),
        FieldRule::new("certificate_number", &["执业证号", "证书编号", "执业编号"], TOKEN),
        FieldRule::new("law_firm", &["律师事务所", "执业机构", "所在机构"], TOKEN),
        FieldRule::new("issue_date", &["发证日期", "颁发日期", "签发日期"], TOKEN),
    ]
});

static PERFORMANCE_RULES: LazyLock<Vec<FieldRule>> = LazyLock::new(|| {
    vec![
        FieldRule::new("project_name", &["项目名称", "案件名称", "合同名称", "委托事项"], TOKEN),
        FieldRule::new("client_name", &["甲方", "委托方", "客户", "委托人"], TOKEN),
        FieldRule::new("amount", &["金额", "费用", "律师费"], AMOUNT),
    ]
});

static AWARD_RULES: LazyLock<Vec<FieldRule>> = LazyLock::new(|| {
    vec![
        FieldRule::new("award_name", &["奖项", "荣誉", "表彰"], TOKEN),
        FieldRule::new("issuer", &["颁发机构", "主办方", "组织方"], TOKEN),
    ]
});

static JUSTICE_ISSUER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S*司法[局厅部]\S*").expect("valid issuer regex"));

fn apply(rules: &[FieldRule], text: &str) -> BTreeMap<String, String> {
    rules
        .iter()
        .filter_map(|rule| rule.capture(text).map(|value| (rule.key.to_string(), value)))
        .collect()
}

pub fn extract_lawyer_entities(text: &str) -> BTreeMap<String, String> {
    let mut entities = apply(&LAWYER_RULES, text);
    if let Some(issuer) = JUSTICE_ISSUER.find(text) {
        entities.insert("issuer".to_string(), issuer.as_str().to_string());
    }
    if text.contains("合伙人") {
        entities.insert("position".to_string(), "合伙人".to_string());
    }
    entities
}

pub fn extract_performance_entities(text: &str) -> BTreeMap<String, String> {
    apply(&PERFORMANCE_RULES, text)
}

pub fn extract_award_entities(text: &str) -> BTreeMap<String, String> {
    apply(&AWARD_RULES, text)
}

/// Entities relevant to the given category; empty for categories without rules.
pub fn extract_entities(category: DocumentCategory, text: &str) -> BTreeMap<String, String> {
    match category {
        DocumentCategory::LawyerCertificate => extract_lawyer_entities(text),
        DocumentCategory::PerformanceContract => extract_performance_entities(text),
        DocumentCategory::AwardCertificate => extract_award_entities(text),
        DocumentCategory::QualificationCertificate | DocumentCategory::Other => BTreeMap::new(),
    }
}
