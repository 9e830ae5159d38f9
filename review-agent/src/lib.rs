//! The review agent and its structured-output retry engine.
//!
//! The agent is modeled as a small capability: `run(message) → response`.
//! Concrete agents wrap an LLM endpoint (with an optional codebase toolkit
//! and session transcript); tests use scripted fakes that replay a
//! sequence of contents. The retry engine coerces whatever the agent
//! produced into a validated [`review_model::Review`], feeding validation
//! errors back to the model up to a bound.

pub mod agent;
pub mod errors;
pub mod prompts;
pub mod retry;
pub mod session;

use review_model::Review;
use serde_json::{Map, Value};

pub use agent::{ReviewAgent, ReviewAgentOptions, format_pr_context, resolve_transport};
pub use errors::{AgentError, ReviewParseError, RetryError};
pub use prompts::ReviewMode;
pub use retry::{ParseFailure, run_review, run_review_with};
pub use session::SessionLog;

/// What an agent handed back, as a tagged union instead of downcast chains.
#[derive(Debug, Clone)]
pub enum AgentContent {
    /// Already a validated review (structured-output transports).
    Review(Box<Review>),
    /// A parsed JSON object, not yet schema-validated.
    Map(Map<String, Value>),
    /// Raw text, possibly JSON, possibly fenced in markdown.
    Text(String),
    /// The agent produced nothing.
    Nil,
}

/// Opaque response envelope from an agent.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub content: AgentContent,
}

/// An opaque capability that produces a review candidate for a message.
pub trait Agent {
    fn run(
        &mut self,
        message: &str,
    ) -> impl Future<Output = Result<AgentResponse, AgentError>> + Send;
}
