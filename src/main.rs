//! CI entry point for the review pipeline.
//!
//! Reads configuration from the environment (plus an optional `.env` for
//! local runs), executes the staged pipeline, and exits nonzero on
//! config/diff/parse/timeout failures or a merge-blocking verdict.

mod ci_output;
mod config;
mod error_comment;
mod event;
mod pipeline;

use tracing::Level;
use tracing_subscriber::fmt;

use ai_llm_service::telemetry::{ChronoRfc3339Utc, env_filter_with_level};

fn init_logging() {
    fmt()
        .with_env_filter(env_filter_with_level("info", Level::INFO))
        .with_timer(ChronoRfc3339Utc)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    // Local runs may carry a .env; CI provides real environment variables.
    let _ = dotenvy::dotenv();
    init_logging();

    let code = pipeline::run().await;
    std::process::exit(code);
}
