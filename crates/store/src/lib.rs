//! In-process job state store.
//!
//! [`JobStore`] is the single source of truth for per-file upload and
//! processing state. Writers (the chunk uploader and the progress
//! channels) patch records in place; readers take snapshots or subscribe
//! to [`JobChange`] notifications.

pub mod store;

pub use store::{JobChange, JobStore};
