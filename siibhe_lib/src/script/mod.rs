//! Extraction of data objects embedded in report pages as JavaScript.
//!
//! Pipeline: [`locate::find_script`] → [`transform::transform`] →
//! [`eval::evaluate`], chained by [`extract_object`].

pub mod eval;
pub mod lexer;
pub mod locate;
pub mod transform;

use std::time::Duration;

use crate::error::ExtractionError;
use crate::raw::RawFieldMap;

/// Environment variable overriding the evaluation deadline, in milliseconds.
pub const TIMEOUT_ENV: &str = "SIIBHE_SCRIPT_TIMEOUT_MS";

/// Resource bounds of one script evaluation.
#[derive(Clone, Debug)]
pub struct EvalOptions {
    /// Wall-clock deadline.
    pub timeout: Duration,
    /// Maximum number of evaluation steps.
    pub max_steps: u64,
    /// Maximum length in bytes of any string built by the script.
    pub max_string_len: usize,
    /// Maximum expression and object nesting depth.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            max_steps: 1_000_000,
            max_string_len: 4 * 1024 * 1024,
            max_depth: 64,
        }
    }
}

impl EvalOptions {
    /// Defaults, with the deadline taken from `SIIBHE_SCRIPT_TIMEOUT_MS` when set.
    pub fn from_env() -> Self {
        Self::default().with_timeout_ms(std::env::var(TIMEOUT_ENV).ok().as_deref())
    }

    fn with_timeout_ms(mut self, value: Option<&str>) -> Self {
        if let Some(raw) = value {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!("Ignoring invalid {}={:?}", TIMEOUT_ENV, raw),
            }
        }
        self
    }
}

/// Locates, rewrites and evaluates the script declaring `name` in `html`.
pub fn extract_object(
    html: &str,
    name: &str,
    options: &EvalOptions,
) -> Result<RawFieldMap, ExtractionError> {
    let script = locate::find_script(html, name)?;
    let program = transform::transform(script, name);
    let fields = eval::evaluate(&program, options)?;
    tracing::debug!(
        "Extracted `{}`: {} script bytes, {} fields",
        name,
        script.len(),
        fields.len()
    );
    Ok(fields)
}
