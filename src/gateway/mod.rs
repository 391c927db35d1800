//! Extraction orchestration

mod builder;
mod extractor;

pub use builder::{DEFAULT_TIMEOUT, Skald, SkaldBuilder};
pub use extractor::Extractor;
