//! Advanced-metadata reconciliation
//!
//! Opaque `advanced`/`matchAdvanced` payloads are validated by the service
//! against identity tokens it issued. When a caller replaces a whole rule
//! tree, those tokens have to be carried over from the tree being replaced.
//! Entries are bucketed by a digest of their payload and paired by the
//! depth of their ancestry; anything that cannot be paired fails loudly.

pub mod digest;
pub mod engine;
pub mod metadata;

pub use digest::content_hash;
pub use engine::{reconcile, reconcile_counted};
pub use metadata::{collect_advanced, AdvancedMetadataEntry};
