//! asklyne-embed
//!
//! Model lifecycle for the embedding and rerank collaborators: a single-flight
//! registry keyed by model id, a hub that maps tier profiles onto it, and
//! deterministic hashing models for offline use.

pub mod hashing;
pub mod hub;
pub mod registry;

pub use hashing::{HashingEmbedder, HashingLoader, LexicalScorer};
pub use hub::{ModelHub, ModelLoader};
pub use registry::ModelRegistry;
