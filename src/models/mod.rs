//! Core data models for the upload-and-reference pipeline.
//!
//! Pure types only: validation policy, in-memory and stored media files,
//! category selections, and the post draft. No I/O happens here; the
//! services and client modules drive these through the network and disk.

pub mod category;
pub mod draft;
pub mod media;
pub mod policy;
