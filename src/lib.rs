//! Sports value-bet analysis: LLM-backed match analysis, a deterministic
//! confidence score, EV and Kelly arithmetic, and a per-user batch quota.

pub mod analysis;
pub mod auth;
pub mod betting;
pub mod config;
pub mod data;
pub mod error;
pub mod llm;
pub mod monitoring;
pub mod schema;
pub mod server;
pub mod store;

pub use error::{AnalysisError, Result};
