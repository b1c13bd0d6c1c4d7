use std::collections::{BTreeMap, BTreeSet};

use crate::config::BusinessFieldConfig;

const DOCUMENT_KIND_TAGS: [&str; 4] = ["合同", "协议", "证书", "报告"];

/// Business-field names and document-kind tags found in the text, sorted and deduplicated.
pub fn extract_tags(text: &str, fields: &BTreeMap<String, BusinessFieldConfig>) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tags = BTreeSet::new();

    for field in fields.values().filter(|f| f.is_active) {
        if field.keywords.iter().any(|k| lowered.contains(&k.to_lowercase())) {
            tags.insert(field.name.clone());
        }
    }

    for kind in DOCUMENT_KIND_TAGS {
        if text.contains(kind) {
            tags.insert(kind.to_string());
        }
    }

    tags.into_iter().collect()
}

/// Append `suggested` to `existing`, skipping tags already present.
pub fn merge_tags(existing: &[String], suggested: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for tag in suggested {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}
