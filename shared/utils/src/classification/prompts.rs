//! Prompt Templates
//!
//! Handlebars rendering of the classification prompts sent to the text model,
//! plus the reminder notes built from user corrections.

use anyhow::{Context, Result};
use handlebars::Handlebars;
use lexbid_models::{DocumentCategory, UserCorrection};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};

use crate::config::{BusinessFieldConfig, ClassificationConfig, DocumentTypeConfig, PromptTemplateConfig};

pub const DOCUMENT_CLASSIFICATION: &str = "document_classification";
pub const BUSINESS_FIELD_CLASSIFICATION: &str = "business_field_classification";

pub const LAW_FIRM_LICENSE_CORRECTION: &str = "law_firm_license_vs_personal_certificate";
const LAW_FIRM_LICENSE_NOTE: &str = "重要提醒：律师事务所执业许可证应归类为qualification_certificate（资质证照），\
而非lawyer_certificate（个人律师证）。机构资质与个人证书要严格区分。";

const CLASSIFICATION_SYSTEM: &str = "你是一名律师事务所投标文件整理助手，负责判断文档类型并提取关键信息。只返回JSON。";

const CLASSIFICATION_USER: &str = r#"请分析以下文档内容（可能包含OCR文本和视觉分析结果）：

{{content}}

可选的文档类型：
{{document_types}}

可选的业务领域：
{{business_fields}}

请以JSON格式返回：
{"category": "文档类型代码", "confidence": 0.0-1.0, "description": "分析总结与分类理由",
 "keywords": ["关键词"], "business_field": "业务领域", "year": 年份或null}

注意：
- qualification_certificate 指律师事务所执业许可证、营业执照等机构资质证明
- lawyer_certificate 指个人律师执业证书，包含律师姓名、执业证号等
- 涉及破产、重整、债务重组、债权申报的，业务领域应为"破产重整"{{#if learning_notes}}

基于用户反馈的重要改进提醒：
{{#each learning_notes}}{{this}}
{{/each}}{{/if}}"#;

const BUSINESS_FIELD_SYSTEM: &str = "你是一名法律业务领域分类助手。只返回JSON。";

const BUSINESS_FIELD_USER: &str = r#"请判断以下内容所属的业务领域：

{{content}}

可选的业务领域：
{{business_fields}}

请以JSON格式返回：{"business_field": "业务领域名称", "confidence": 0.0-1.0}"#;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Prompt renderer
pub struct PromptEngine {
    handlebars: Handlebars<'static>,
    templates: HashMap<String, PromptTemplateConfig>,
    document_types: String,
    business_fields: String,
}

impl PromptEngine {
    pub fn new(config: &ClassificationConfig) -> Self {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);

        let mut engine = Self {
            handlebars,
            templates: HashMap::new(),
            document_types: format_document_types(&config.document_types),
            business_fields: format_business_fields(&config.business_fields),
        };
        engine.register_builtin_templates();

        for (name, template) in &config.prompts {
            engine.templates.insert(name.clone(), template.clone());
        }
        engine
    }

    fn register_builtin_templates(&mut self) {
        self.templates.insert(
            DOCUMENT_CLASSIFICATION.to_string(),
            PromptTemplateConfig {
                system: CLASSIFICATION_SYSTEM.to_string(),
                user_template: CLASSIFICATION_USER.to_string(),
            },
        );
        self.templates.insert(
            BUSINESS_FIELD_CLASSIFICATION.to_string(),
            PromptTemplateConfig {
                system: BUSINESS_FIELD_SYSTEM.to_string(),
                user_template: BUSINESS_FIELD_USER.to_string(),
            },
        );
    }

    pub fn render(&self, name: &str, content: &str, learning_notes: &[String]) -> Result<RenderedPrompt> {
        let template = self
            .templates
            .get(name)
            .with_context(|| format!("Prompt template not found: {}", name))?;

        let variables = json!({
            "content": content,
            "document_types": self.document_types,
            "business_fields": self.business_fields,
            "learning_notes": learning_notes,
        });

        let user = self
            .handlebars
            .render_template(&template.user_template, &variables)
            .with_context(|| format!("Failed to render prompt {}", name))?;

        Ok(RenderedPrompt {
            system: template.system.clone(),
            user,
        })
    }
}

fn format_document_types(types: &BTreeMap<String, DocumentTypeConfig>) -> String {
    if types.is_empty() {
        return DocumentCategory::ALL
            .iter()
            .map(|c| format!("- {}: {}", c.as_str(), c.display_name()))
            .collect::<Vec<_>>()
            .join("\n");
    }

    types
        .iter()
        .map(|(code, t)| format!("- {}: {} - {} (关键词: {})", code, t.name, t.description, t.keywords.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_business_fields(fields: &BTreeMap<String, BusinessFieldConfig>) -> String {
    fields
        .iter()
        .filter(|(_, f)| f.is_active)
        .map(|(code, f)| format!("- {}: {} (关键词: {})", code, f.name, f.keywords.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reminder lines built from the most recent `limit` corrections.
pub fn learning_notes(corrections: &[UserCorrection], limit: usize) -> Vec<String> {
    let start = corrections.len().saturating_sub(limit);
    let mut notes = Vec::new();

    for correction in &corrections[start..] {
        if correction.specific_correction.as_deref() == Some(LAW_FIRM_LICENSE_CORRECTION) {
            notes.push(LAW_FIRM_LICENSE_NOTE.to_string());
        }
        if !correction.original_classification.is_empty() && !correction.user_correction.is_empty() {
            notes.push(format!(
                "学习案例：{} 类型文档被用户修正为 {}",
                correction.original_classification, correction.user_correction
            ));
        }
    }
    notes
}
