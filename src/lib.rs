//! Media upload relay and client toolkit for the powder feed.
//!
//! The server side (`handlers`, `routes`, `services`) is a small HTTP relay
//! that keeps feed media on local disk with metadata in SQLite, speaking the
//! same wire contract the feed's frontend always spoke. The `client` module
//! is the other half of that contract: upload validation and naming, URL
//! resolution, category management, drafting helpers, and the submission
//! flow that ties them together.

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
