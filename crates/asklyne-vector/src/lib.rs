//! asklyne-vector
//!
//! LanceDB-backed vector store: one table per collection, cosine distance,
//! filters pushed down as SQL predicates.

pub mod schema;
pub mod table;
pub mod store;

pub use store::LanceVectorStore;
