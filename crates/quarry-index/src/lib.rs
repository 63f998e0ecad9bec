//! Repository function index for Quarry.
//!
//! Loads immutable, per-repository collections of extracted function records
//! from the corpus directory written by the extraction pipeline. The store is
//! strictly read-only: search tiers resolve ranking output against it, and
//! the fan-out coordinator hands each worker its own handle.

mod store;

pub use store::{CorpusStore, FunctionIndex};
