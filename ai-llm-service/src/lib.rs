//! Shared LLM service layer for the review pipeline.
//!
//! Two providers speak the same OpenAI-compatible wire protocol:
//! - [`services::open_ai_service::OpenAiService`] — hosted OpenAI (Bearer key required).
//! - [`services::local_ai_service::LocalAiService`] — a local endpoint such as
//!   LM Studio (any non-empty key accepted).
//!
//! [`service_profiles::LlmServiceProfiles`] bundles a **review** profile and an
//! **embedding** profile, caches HTTP clients per config, and exposes chat
//! (with tool-call support) plus single/batch embeddings.

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::AiLlmError;
pub use service_profiles::LlmServiceProfiles;
pub use services::wire::{ChatMessage, ChatOutcome, ToolCall, ToolSpec};
