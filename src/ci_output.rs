//! CI output sink — newline-separated `key=value` pairs appended to the
//! file the platform names.

use std::io::Write;
use std::path::Path;

use tracing::warn;

/// Appends the pairs; failures only warn, outputs are advisory.
pub fn write_ci_outputs(path: &Path, pairs: &[(&str, String)]) {
    let file = std::fs::OpenOptions::new().create(true).append(true).open(path);
    let mut file = match file {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot open CI output file");
            return;
        }
    };
    for (key, value) in pairs {
        if let Err(e) = writeln!(file, "{key}={value}") {
            warn!(key, error = %e, "failed to write CI output");
            return;
        }
    }
}
