//! Receiver-side chunk reassembly and progress accounting.

pub mod chunk_engine;
pub mod error;
pub mod progress;

pub use chunk_engine::{ChunkEngine, StoreOutcome};
pub use error::IntegrityError;
pub use progress::{ProgressSnapshot, ProgressTracker};
