//! Potion inspection
//!
//! This module handles:
//! - Reading potion references out of generated images (reference.rs)
//! - Resolving them against the encoding index (reference.rs)
//! - Rescaling reference strengths when one is edited (strength.rs)

pub mod reference;
pub mod strength;

pub use reference::{MetadataIssue, PotionMember, PotionReference, ReferenceGroup, Resolution};
pub use strength::{format_strength, redistribute, Redistribution, StrengthWarning};
