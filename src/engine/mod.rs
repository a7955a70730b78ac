//! Request-level orchestrators: the upload pipeline and the practice-turn
//! engine. Both compose the pure ingest stages with the completion backend
//! and the shared quota/ticket stores.

pub mod chat;
pub mod upload;

pub use chat::{run_turn, TurnOutcome, TurnRequest};
pub use upload::{process_upload, Persona, UploadOutcome, UploadedFile};
