//! State management module
//!
//! This module handles all catalog state, including:
//! - Directory scans and the browsing catalog (library.rs)
//! - Shared data structures and the vibe record schema (data.rs)
//! - The encoding identifier lookup (index.rs)
//! - Import settings edits (edit.rs)

pub mod data;
pub mod edit;
pub mod index;
pub mod library;
