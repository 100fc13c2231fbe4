//! asklyne-text
//!
//! Tantivy-backed keyword store. One index per collection, filtered by session
//! and mode at query time.

pub mod tantivy_utils;
pub mod store;

pub use store::TantivyKeywordStore;
