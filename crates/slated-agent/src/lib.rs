//! # slated-agent
//!
//! Client for the remote model/agent service.
//!
//! Everything the service exposes goes through the [`AgentApi`] trait:
//! agent reconciliation, file upload, vector stores, and `responses`
//! invocations. The production [`FoundryClient`] adds bearer auth with a
//! cached token, tolerant URL composition, and retry with jittered backoff.

mod auth;
mod client;
pub mod parse;
pub mod schema;
mod types;

pub use auth::{AccessToken, EnvTokenProvider, TokenCache, TokenProvider, TOKEN_AUDIENCE};
pub use client::{AgentApi, FoundryClient};
pub use types::{AgentDefinition, AgentTool, PromptDefinition};
