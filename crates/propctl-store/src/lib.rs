//! propctl Store - rule-tree persistence
//!
//! Provides:
//! - The `RuleTreeStore` capability (`read`/`write` of raw bytes)
//! - A filesystem store with atomic temp→rename writes
//! - An in-memory store for tests and dry runs
//! - Loading and saving rule-tree documents as 2-space-indented UTF-8 JSON

pub mod atomic;
pub mod document;
pub mod errors;
pub mod fs_store;

// Re-export key types
pub use document::{load_document, load_value, save_document};
pub use errors::Result;
pub use fs_store::{FsRuleTreeStore, MemoryRuleTreeStore, RuleTreeStore};
