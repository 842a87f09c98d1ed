//! The eval result record handed back to the host.

use std::fmt;

use serde::{Deserialize, Serialize};

use scriptbox_core::{ErrorKind, EvalOutcome};

/// Outcome of one eval.
///
/// `value` is the inspect form of the result and is present iff the eval
/// succeeded; `output` is whatever the script printed (possibly empty);
/// `error` is present iff the eval failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalResult {
    pub value: Option<String>,
    pub output: String,
    pub error: Option<String>,
    pub kind: ErrorKind,
}

impl EvalResult {
    pub(crate) fn from_outcome(outcome: EvalOutcome) -> Self {
        Self {
            value: outcome.value,
            output: outcome.output,
            error: outcome.error,
            kind: outcome.kind,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind != ErrorKind::None
    }

    /// Uniform text rendering: captured output first, then `=> <value>` on
    /// success or `Error: <message>` on failure. This is the shape handed to
    /// an agent's model regardless of how the eval went.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.output.len() + 16);
        out.push_str(&self.output);
        match &self.error {
            Some(message) => {
                out.push_str("Error: ");
                out.push_str(message);
            }
            None => {
                out.push_str("=> ");
                out.push_str(self.value.as_deref().unwrap_or("nil"));
            }
        }
        out
    }
}

impl fmt::Display for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
