//! Pure domain logic for chunked uploads and remote job tracking.
//!
//! Nothing in this crate performs I/O. It holds the chunk splitter, the
//! upload-progress arithmetic, the per-file job record with its merge
//! rules, and the file admission checks shared by the client and CLI.

pub mod admission;
pub mod chunking;
pub mod error;
pub mod job;
pub mod types;
