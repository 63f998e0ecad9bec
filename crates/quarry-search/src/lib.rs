//! Ranking tiers, per-repository query orchestration, and multi-repository
//! fan-out for Quarry.
//!
//! The search path is a strict two-tier cascade per repository: the
//! LLM-backed semantic ranker when a provider credential is available, with
//! a deterministic keyword scorer as the always-available fallback.
//! [`fanout::search_many`] runs the cascade concurrently across corpora and
//! merges the results into one globally ranked sequence.

pub mod arxiv;
pub mod fanout;
pub mod keyword;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod semantic;
