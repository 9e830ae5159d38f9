//! Tracing helpers shared by the review pipeline binary.
//!
//! Provides a compact, RFC3339-UTC-timestamped format layer plus the
//! env-filter plumbing the binary composes at startup.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Crate target prefix used to scope per-crate level directives.
pub const TARGET_PREFIX: &str = "ai_llm_service";

/// RFC3339 UTC timer implemented via `chrono`.
/// Example output: `2026-02-01T10:20:30Z`
#[derive(Clone, Debug, Default)]
pub struct ChronoRfc3339Utc;

impl FormatTime for ChronoRfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        // Compact timestamps: no fractional seconds, Z-suffix
        let s = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        w.write_str(&s)
    }
}

/// Level directive for **this** library only, e.g. `ai_llm_service=debug`.
pub fn level_directive(level: Level) -> Directive {
    let s = format!("{TARGET_PREFIX}={}", level.as_str().to_lowercase());
    Directive::from_str(&s).expect("valid level directive")
}

/// EnvFilter from the environment or a fallback default, with a per-crate
/// level directive for this library applied on top.
pub fn env_filter_with_level(default: &str, level: Level) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    base.add_directive(level_directive(level))
}
