//! Document Analysis Service
//!
//! Runs the classification channels over a stored document, fuses their
//! results and enriches the fused classification with entities, tags and a
//! business field.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lexbid_database::{content_hash, AiTaskRepository, AnalysisCache, AnalysisRepository};
use lexbid_models::{
    AiTask, AnalysisRecord, AnalysisSource, ClassificationResult, DocumentCategory, FileKind, FusedResult,
    FusionSource, ProcessingStatus, TaskStatus,
};
use lexbid_utils::classification::keywords::excerpt;
use lexbid_utils::classification::prompts::DOCUMENT_CLASSIFICATION;
use lexbid_utils::classification::{
    classify_business_field, extract_entities, extract_tags, extract_year, learning_notes, merge_tags,
    parse_classification_reply,
};
use lexbid_utils::{LexbidError, LexbidResult};

use crate::metrics;
use crate::settings::AnalysisSettings;
use crate::text_extractor::TextExtractor;

pub const ANALYSIS_TASK_TYPE: &str = "document_analysis";
const DESCRIPTION_EXCERPT_CHARS: usize = 300;

/// Stored document
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub file_kind: FileKind,
    pub content_hash: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
    pub status: ProcessingStatus,
    pub tags: Vec<String>,
    pub analysis: Option<FusedResult>,
    #[serde(skip)]
    pub data: Arc<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Completed,
    Skipped,
    Failed,
}

/// Outcome of one channel within an analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: AnalysisSource,
    pub status: ChannelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<DocumentCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ChannelReport {
    fn completed(channel: AnalysisSource, result: &ClassificationResult, detail: impl Into<String>) -> Self {
        Self {
            channel,
            status: ChannelStatus::Completed,
            detail: Some(detail.into()),
            category: result.category,
            confidence: Some(result.confidence),
        }
    }

    fn skipped(channel: AnalysisSource, reason: &str) -> Self {
        Self {
            channel,
            status: ChannelStatus::Skipped,
            detail: Some(reason.to_string()),
            category: None,
            confidence: None,
        }
    }

    fn failed(channel: AnalysisSource, error: &dyn std::fmt::Display) -> Self {
        warn!(channel = %channel, error = %error, "Analysis channel failed");
        metrics::record_channel_failure(channel);
        Self {
            channel,
            status: ChannelStatus::Failed,
            detail: Some(format!("{:#}", error)),
            category: None,
            confidence: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub document_id: Uuid,
    pub task_id: Uuid,
    pub result: FusedResult,
    pub needs_review: bool,
    pub cached: bool,
    pub channels: Vec<ChannelReport>,
}

/// Per-channel results plus the text the channels saw.
#[derive(Default)]
struct ChannelOutput {
    results: Vec<ClassificationResult>,
    reports: Vec<ChannelReport>,
    document_text: String,
    vision_text: String,
}

impl ChannelOutput {
    fn push(&mut self, result: ClassificationResult, report: ChannelReport) {
        self.results.push(result);
        self.reports.push(report);
    }

    fn combined_text(&self) -> String {
        [self.document_text.as_str(), self.vision_text.as_str()]
            .iter()
            .filter(|t| !t.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Document analysis service
#[derive(Clone)]
pub struct DocumentAnalyzer {
    documents: Arc<RwLock<HashMap<Uuid, StoredDocument>>>,
    tasks: Arc<RwLock<HashMap<Uuid, AiTask>>>,
    analyses: Option<AnalysisRepository>,
    task_repository: Option<AiTaskRepository>,
    cache: Option<AnalysisCache>,
    text_extractor: TextExtractor,
}

impl DocumentAnalyzer {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            tasks: Arc::new(RwLock::new(HashMap::new())),
            analyses: None,
            task_repository: None,
            cache: None,
            text_extractor: TextExtractor::new(),
        }
    }

    pub fn with_database(mut self, analyses: AnalysisRepository, tasks: AiTaskRepository) -> Self {
        self.analyses = Some(analyses);
        self.task_repository = Some(tasks);
        self
    }

    pub fn with_cache(mut self, cache: AnalysisCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Store uploaded document
    pub async fn store_document(
        &self,
        filename: &str,
        content_type: &str,
        file_kind: FileKind,
        data: Vec<u8>,
    ) -> StoredDocument {
        let document = StoredDocument {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            file_kind,
            content_hash: content_hash(&data),
            size_bytes: data.len(),
            uploaded_at: Utc::now(),
            status: ProcessingStatus::Uploaded,
            tags: Vec::new(),
            analysis: None,
            data: Arc::new(data),
        };

        let mut documents = self.documents.write().await;
        documents.insert(document.id, document.clone());
        info!(document_id = %document.id, filename, size = document.size_bytes, "Document stored");

        document
    }

    /// Get document by ID, filling in the last stored analysis when the
    /// in-memory copy has none.
    pub async fn get_document(&self, id: Uuid) -> Option<StoredDocument> {
        let mut document = self.documents.read().await.get(&id).cloned()?;

        if document.analysis.is_none() {
            if let Some(repository) = &self.analyses {
                match repository.find_latest(id).await {
                    Ok(record) => document.analysis = record.and_then(|r| r.fused_result()),
                    Err(e) => warn!(document_id = %id, error = %e, "Failed to load stored analysis"),
                }
            }
        }

        Some(document)
    }

    pub async fn get_task(&self, id: Uuid) -> Option<AiTask> {
        if let Some(task) = self.tasks.read().await.get(&id) {
            return Some(task.clone());
        }

        let repository = self.task_repository.as_ref()?;
        match repository.get(id).await {
            Ok(task) => task,
            Err(e) => {
                warn!(task_id = %id, error = %e, "Failed to load task");
                None
            }
        }
    }

    /// Run every channel over the document and fuse the results.
    ///
    /// Results for identical content are reused only on a document's first
    /// analysis; `refresh` or any later run goes through the channels again.
    pub async fn analyze(
        &self,
        id: Uuid,
        settings: Arc<AnalysisSettings>,
        refresh: bool,
    ) -> LexbidResult<AnalysisReport> {
        let document = self.begin_processing(id).await?;

        let task_id = self.create_task(id).await;
        self.update_task(task_id, TaskStatus::Processing, None, None).await;

        if reuses_cached(&document, refresh) {
            if let Some(fused) = self.cached_analysis(&document.content_hash).await {
                debug!(document_id = %id, "Using cached analysis");
                return Ok(self.finish(&document, task_id, fused, Vec::new(), true, &settings).await);
            }
        }

        let output = self.run_channels(&document, &settings).await;
        let mut fused = settings.fusion.fuse(&output.results);
        metrics::record_fusion(fused.source);

        if fused.error.is_none() {
            enrich(&mut fused, &output.combined_text(), &document.tags, &settings);
            self.persist(&document, &fused).await;
        }

        Ok(self.finish(&document, task_id, fused, output.reports, false, &settings).await)
    }

    /// Tags suggested from the document's own text, merged after its existing tags.
    pub async fn suggest_tags(&self, id: Uuid, settings: &AnalysisSettings) -> LexbidResult<Vec<String>> {
        let document = self
            .get_document(id)
            .await
            .ok_or_else(|| LexbidError::not_found(format!("document {}", id)))?;

        let mut text = match self.text_extractor.extract_blocking(document.file_kind, document.data.clone()).await {
            Ok(Some(extracted)) => extracted.text,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(document_id = %id, error = %e, "Text extraction failed while suggesting tags");
                String::new()
            }
        };
        if let Some(analysis) = &document.analysis {
            text.push('\n');
            text.push_str(&analysis.description);
        }

        let mut tags = merge_tags(&document.tags, &extract_tags(&text, &settings.classification.business_fields));
        if let Some(analysis) = &document.analysis {
            tags = merge_tags(&tags, &analysis.suggested_tags);
        }
        Ok(tags)
    }

    async fn run_channels(&self, document: &StoredDocument, settings: &AnalysisSettings) -> ChannelOutput {
        let mut output = ChannelOutput::default();

        self.text_channel(document, settings, &mut output).await;
        ocr_channel(document, settings, &mut output).await;
        vision_channel(document, settings, &mut output).await;
        ai_text_channel(settings, &mut output).await;

        output
    }

    async fn text_channel(&self, document: &StoredDocument, settings: &AnalysisSettings, output: &mut ChannelOutput) {
        let channel = AnalysisSource::TextExtraction;
        match self.text_extractor.extract_blocking(document.file_kind, document.data.clone()).await {
            Ok(Some(extracted)) if !extracted.is_empty() => {
                let result = settings.keywords.classify(&extracted.text).with_source(channel);
                let report = ChannelReport::completed(channel, &result, format!("{} characters", extracted.char_count));
                output.document_text = extracted.text;
                output.push(result, report);
            }
            Ok(Some(_)) => output.reports.push(ChannelReport::skipped(channel, "no text layer")),
            Ok(None) => output.reports.push(ChannelReport::skipped(channel, "file kind has no text layer")),
            Err(e) => output.reports.push(ChannelReport::failed(channel, &e)),
        }
    }

    /// Earlier result for identical content: Redis first, then the stored analyses.
    async fn cached_analysis(&self, hash: &str) -> Option<FusedResult> {
        if let Some(cache) = &self.cache {
            match cache.get(hash).await {
                Ok(Some(hit)) => return Some(hit),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Analysis cache unavailable"),
            }
        }

        let repository = self.analyses.as_ref()?;
        match repository.find_by_content_hash(hash).await {
            Ok(record) => record.and_then(|r| r.fused_result()),
            Err(e) => {
                warn!(error = %e, "Failed to look up analysis by content hash");
                None
            }
        }
    }

    async fn persist(&self, document: &StoredDocument, fused: &FusedResult) {
        if let Some(repository) = &self.analyses {
            let record = AnalysisRecord::new(document.id, &document.filename, &document.content_hash, fused);
            if let Err(e) = repository.save(&record).await {
                warn!(document_id = %document.id, error = %e, "Failed to save analysis");
            }
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&document.content_hash, fused).await {
                warn!(document_id = %document.id, error = %e, "Failed to cache analysis");
            }
        }
    }

    async fn finish(
        &self,
        document: &StoredDocument,
        task_id: Uuid,
        fused: FusedResult,
        channels: Vec<ChannelReport>,
        cached: bool,
        settings: &AnalysisSettings,
    ) -> AnalysisReport {
        let needs_review = fused.needs_review(settings.classification.review_threshold);

        let (status, outcome) = if fused.error.is_some() {
            (ProcessingStatus::Failed, "failed")
        } else if needs_review {
            (ProcessingStatus::RequiresReview, "needs_review")
        } else {
            (ProcessingStatus::Analyzed, "completed")
        };

        {
            let mut documents = self.documents.write().await;
            if let Some(stored) = documents.get_mut(&document.id) {
                stored.status = status;
                if fused.error.is_none() {
                    stored.tags = merge_tags(&stored.tags, &fused.suggested_tags);
                    stored.analysis = Some(fused.clone());
                }
            }
        }

        match &fused.error {
            Some(error) => self.update_task(task_id, TaskStatus::Failed, None, Some(error)).await,
            None => {
                let result = serde_json::to_value(&fused).ok();
                self.update_task(task_id, TaskStatus::Completed, result, None).await
            }
        }

        metrics::record_analysis(outcome);
        info!(
            document_id = %document.id,
            category = %fused.category,
            confidence = fused.confidence,
            source = %fused.source,
            needs_review,
            cached,
            "Document analysed"
        );

        AnalysisReport {
            document_id: document.id,
            task_id,
            result: fused,
            needs_review,
            cached,
            channels,
        }
    }

    /// Marks the document as processing, refusing a second concurrent run.
    async fn begin_processing(&self, id: Uuid) -> LexbidResult<StoredDocument> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&id)
            .ok_or_else(|| LexbidError::not_found(format!("document {}", id)))?;

        if document.status == ProcessingStatus::Processing {
            return Err(LexbidError::conflict(format!("document {} is already being analysed", id)));
        }
        document.status = ProcessingStatus::Processing;
        Ok(document.clone())
    }

    async fn create_task(&self, document_id: Uuid) -> Uuid {
        let task = AiTask::new(document_id, ANALYSIS_TASK_TYPE);
        let id = task.id;

        if let Some(repository) = &self.task_repository {
            if let Err(e) = repository.create(&task).await {
                warn!(task_id = %id, error = %e, "Failed to persist task");
            }
        }
        self.tasks.write().await.insert(id, task);
        id
    }

    async fn update_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        result: Option<serde_json::Value>,
        error: Option<&str>,
    ) {
        {
            let mut tasks = self.tasks.write().await;
            let Some(task) = tasks.get_mut(&id) else {
                return;
            };
            let allowed = task.status().map(|current| current.can_transition_to(status)).unwrap_or(false);
            if !allowed {
                warn!(task_id = %id, from = %task.status, to = status.as_str(), "Ignoring task transition");
                return;
            }
            task.status = status.as_str().to_string();
            task.result = result.clone();
            task.error = error.map(str::to_string);
            task.updated_at = Utc::now();
        }

        if let Some(repository) = &self.task_repository {
            if let Err(e) = repository.update_status(id, status, result.as_ref(), error).await {
                warn!(task_id = %id, error = %e, "Failed to update task");
            }
        }
    }
}

impl Default for DocumentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

async fn ocr_channel(document: &StoredDocument, settings: &AnalysisSettings, output: &mut ChannelOutput) {
    let channel = AnalysisSource::Ocr;
    if !document.file_kind.is_visual() {
        output.reports.push(ChannelReport::skipped(channel, "not an image or PDF"));
        return;
    }
    let Some(client) = &settings.ocr_client else {
        output.reports.push(ChannelReport::skipped(channel, "OCR not configured"));
        return;
    };

    match client.recognize(&document.data).await {
        Ok(text) if !text.trim().is_empty() => {
            let result = settings.keywords.classify(&text).with_source(channel);
            let report = ChannelReport::completed(channel, &result, format!("{} characters", text.chars().count()));
            if !output.document_text.is_empty() {
                output.document_text.push('\n');
            }
            output.document_text.push_str(text.trim());
            output.push(result, report);
        }
        Ok(_) => output.reports.push(ChannelReport::skipped(channel, "no text recognised")),
        Err(e) => output.reports.push(ChannelReport::failed(channel, &e)),
    }
}

async fn vision_channel(document: &StoredDocument, settings: &AnalysisSettings, output: &mut ChannelOutput) {
    let channel = AnalysisSource::Vision;
    match document.file_kind {
        FileKind::Image => {}
        FileKind::Pdf => {
            output.reports.push(ChannelReport::skipped(channel, "PDF pages are not rendered for vision"));
            return;
        }
        FileKind::Text | FileKind::Unsupported => {
            output.reports.push(ChannelReport::skipped(channel, "not an image"));
            return;
        }
    }
    let Some(client) = &settings.vision_client else {
        output.reports.push(ChannelReport::skipped(channel, "vision model not configured"));
        return;
    };

    let mime = FileKind::image_mime(&document.filename);
    match client.analyze_image(&settings.vision.prompt, &document.data, mime).await {
        Ok(reply) => {
            let parsed = parse_classification_reply(&reply, &settings.keywords);
            let structured = parsed.is_structured();
            let detail = if structured { "structured reply" } else { "keyword fallback" };
            let result = parsed.into_result().with_source(channel);
            let report = ChannelReport::completed(channel, &result, detail);
            output.vision_text = if structured && !result.description.is_empty() {
                result.description.clone()
            } else {
                reply
            };
            output.push(result, report);
        }
        Err(e) => output.reports.push(ChannelReport::failed(channel, &e)),
    }
}

async fn ai_text_channel(settings: &AnalysisSettings, output: &mut ChannelOutput) {
    let channel = AnalysisSource::AiText;
    let Some(client) = &settings.text_client else {
        output.reports.push(ChannelReport::skipped(channel, "AI model not configured"));
        return;
    };
    if output.document_text.is_empty() && output.vision_text.is_empty() {
        output.reports.push(ChannelReport::skipped(channel, "no content to analyse"));
        return;
    }

    let content = prompt_content(
        &output.document_text,
        &output.vision_text,
        settings.classification.text_excerpt_chars,
        settings.classification.vision_excerpt_chars,
    );
    let corrections = settings.learning.corrections().await;
    let notes = learning_notes(&corrections, settings.classification.max_learning_examples);

    let reply = match settings.prompts.render(DOCUMENT_CLASSIFICATION, &content, &notes) {
        Ok(prompt) => client.analyze_text(&prompt.system, &prompt.user).await,
        Err(e) => Err(e),
    };

    match reply {
        Ok(reply) => {
            let parsed = parse_classification_reply(&reply, &settings.keywords);
            let detail = if parsed.is_structured() { "structured reply" } else { "keyword fallback" };
            let result = parsed.into_result().with_source(channel);
            let report = ChannelReport::completed(channel, &result, detail);
            output.push(result, report);
        }
        Err(e) => output.reports.push(ChannelReport::failed(channel, &e)),
    }
}

fn reuses_cached(document: &StoredDocument, refresh: bool) -> bool {
    !refresh && document.analysis.is_none()
}

fn prompt_content(text: &str, vision: &str, text_chars: usize, vision_chars: usize) -> String {
    let mut sections = Vec::new();
    if !text.is_empty() {
        sections.push(format!("文档文本内容：\n{}", excerpt(text, text_chars)));
    }
    if !vision.is_empty() {
        sections.push(format!("视觉分析结果：\n{}", excerpt(vision, vision_chars)));
    }
    sections.join("\n\n")
}

/// Fill what no channel supplied: entities, description, business field, year, tags.
fn enrich(fused: &mut FusedResult, text: &str, existing_tags: &[String], settings: &AnalysisSettings) {
    if fused.source == FusionSource::None {
        return;
    }

    let fields = &settings.classification.business_fields;
    fused.key_entities = extract_entities(fused.category, text);

    if fused.description.is_empty() {
        let snippet = excerpt(text, DESCRIPTION_EXCERPT_CHARS);
        fused.description = if snippet.is_empty() {
            fused.category.display_name().to_string()
        } else {
            format!("{}: {}", fused.category.display_name(), snippet)
        };
    }
    if fused.business_field.is_none() {
        fused.business_field = classify_business_field(text, fields);
    }
    if fused.year.is_none() {
        fused.year = extract_year(text);
    }

    let mut tags = merge_tags(existing_tags, &fused.suggested_tags);
    tags = merge_tags(&tags, &extract_tags(text, fields));
    fused.suggested_tags = tags;
}
