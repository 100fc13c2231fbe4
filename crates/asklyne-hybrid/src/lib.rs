//! asklyne-hybrid
//!
//! The pipeline proper. Write path: chunk, embed, upsert to both stores
//! (`indexer`). Read path: concurrent vector + keyword retrieval with fusion
//! (`retriever`), tier-gated rerank (`reranker`), budgeted context packing
//! (`context`), and the completion call (`assistant`, `llm`).

pub mod assistant;
pub mod context;
pub mod indexer;
pub mod llm;
pub mod reranker;
pub mod retriever;

pub use assistant::{Answer, Assistant, QueryRequest};
pub use context::{ContextBuilder, ContextWindow, SEPARATOR};
pub use indexer::{IngestReport, Ingestor};
pub use llm::InferenceClient;
pub use reranker::{Reranked, Reranker};
pub use retriever::{fuse, Retriever};
