//! Repository module for database CRUD operations
//!
//! Typed access to stored analyses and AI task status.

pub mod analysis;
pub mod task;

pub use analysis::AnalysisRepository;
pub use task::AiTaskRepository;
