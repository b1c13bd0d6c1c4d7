//! Document classification: fusing per-source results, keyword classifiers,
//! entity and tag extraction, and prompt rendering for the text model.

pub mod entities;
pub mod fusion;
pub mod keywords;
pub mod parse;
pub mod prompts;
pub mod tags;

pub use entities::extract_entities;
pub use fusion::{FusionConfig, FusionEngine, FusionError};
pub use keywords::{classify_business_field, classify_fixed, extract_year, KeywordClassifier};
pub use parse::{parse_classification_reply, ParsedReply};
pub use prompts::{learning_notes, PromptEngine, RenderedPrompt};
pub use tags::{extract_tags, merge_tags};
