//! Repograde core: repository quality analysis for developer portfolios.
//!
//! A user picks a combination of repositories; Repograde clones each
//! one, runs a static-analysis toolchain over it, folds the raw metrics
//! into a deterministic 0–100 score, aggregates across the combination,
//! optionally enriches the result with an LLM-written narrative, and
//! persists everything behind an authoritative status state machine
//! (`PENDING → ANALYZING → COMPLETE | FAIL`).
//!
//! Layering, bottom up:
//! - [`types`], [`error`], [`config`]: domain model and plumbing
//! - [`scoring`], [`aggregate`]: pure computation, no I/O
//! - [`analyzer`], [`llm`], [`notify`]: external-world seams
//! - [`store`]: SQLite persistence
//! - [`selection`], [`pipeline`], [`report`]: the operations callers use

pub mod aggregate;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod selection;
pub mod store;
pub mod types;

pub use config::RepogradeConfig;
pub use error::{RepogradeError, Result};
pub use pipeline::AnalysisPipeline;
pub use store::{AnalysisStore, SqliteStore};
