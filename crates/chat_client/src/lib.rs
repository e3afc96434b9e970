//! Client for the chat API layered over the profile index.
//!
//! The service is an external system under test: this crate only speaks its
//! wire contract (`GET /health`, `POST /api/v1/chat/query`) and runs smoke
//! probes against it. Blocking reqwest, no retries.

mod client;
mod probe;

pub use client::{ChatClient, ChatError, ChatMetadata, ChatQuery, ChatResponse, Health};
pub use probe::{run_probe, ProbeReport, QueryCheck, DEFAULT_MESSAGES};
