//! # slated-core
//!
//! Core types for the Slated slide-generation service.
//!
//! Slated turns a natural-language request into a single-slide HTML artifact
//! and a rendered PNG preview by driving a multi-stage pipeline of remote
//! model calls. This crate holds what every other crate shares: the job data
//! model, the process configuration, and the unified error type.

mod config;
mod error;
mod types;

pub use config::{Config, StateStoreKind};
pub use error::{Result, SlatedError};
pub use types::*;
