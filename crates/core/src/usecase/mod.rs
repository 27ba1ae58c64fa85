pub mod chapter_summary;
pub mod orchestrator;
pub mod policy;

pub use orchestrator::{BatchEvent, BatchInput, BatchOrchestrator, BatchOutcome, BatchReport};
pub use policy::{ChunkDecision, ChunkErrorContext, ChunkErrorPolicy, FixedPolicy};
