#![deny(unused_variables)]

pub mod chunker;
pub mod config;
pub mod error;
pub mod policy;
pub mod tokens;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use policy::{TierPolicy, TierProfile};
pub use types::{Chunk, Mode, SearchHit, Session, SourceKind, Tier};
