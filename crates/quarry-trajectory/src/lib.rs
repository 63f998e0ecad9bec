//! Research trajectory synthesis for Quarry.
//!
//! Turns an already-ranked search result set into structured research
//! direction proposals via the same provider abstraction the semantic
//! search tier uses, and can generate prototype source code for a chosen
//! trajectory. Unlike the search path, synthesis fails open: no credential
//! means an empty list, not an error.

pub mod prompt;
mod synthesizer;

pub use synthesizer::{generate_prototype, synthesize};
