//! Vector-store access for the lore note-query pipeline.

pub mod qdrant;

mod error;

pub use error::{Error, Result};
pub use qdrant::{QdrantStore, point_to_reference};
