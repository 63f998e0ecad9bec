//! Core types, configuration, and error handling for the Quarry platform.
//!
//! This crate provides the shared foundation used by all other Quarry crates:
//! - [`QuarryError`]: unified error type using `thiserror`
//! - [`QuarryConfig`]: configuration loaded from `.quarry.toml`
//! - Shared types: [`FunctionRecord`], [`QueryRequest`], [`ScoredResult`],
//!   [`RankedResults`], [`Tier`], [`Trajectory`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{CorpusConfig, LlmConfig, QuarryConfig, SearchConfig};
pub use error::QuarryError;
pub use types::{
    FunctionRecord, OutputFormat, QueryRequest, RankedResults, ScoredResult, Tier, Trajectory,
};

/// A convenience `Result` type for Quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;
