//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - The classification data model ([`Classification`], [`DuplicateRecord`])
//! - Name-based and content-based classification of two trees

pub mod classification;
pub mod classifier;

pub use classification::{
    Classification, CompareMode, DuplicateKind, DuplicateRecord, EquivalenceKey, KeyGroup,
    ShadowedEntry,
};
pub use classifier::{classify, classify_by_name, ClassifyConfig};
