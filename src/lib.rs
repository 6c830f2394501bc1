#![forbid(unsafe_code)]

//! `lexstream` — staged streaming client for AI legal-analysis sessions.
//!
//! Drives a three-stage analysis pipeline against an external service:
//! each stage streams incrementally-generated text over a chunked HTTP
//! response, each stage's completion gates the start of the next, and
//! overall progress is derived from per-stage terminal states.

pub mod config;
pub mod errors;
pub mod gate;
pub mod models;
pub mod pipeline;
pub mod stream;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
