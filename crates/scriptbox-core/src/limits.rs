//! Resource limits: wall-clock deadline and memory cap configuration.
//!
//! The deadline is enforced from an instruction-dispatch hook installed on
//! the interpreter for the duration of each eval; the memory cap is enforced
//! by the interpreter's accounting allocator, armed and disarmed around each
//! eval by the session.

use std::cell::Cell;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::output::DEFAULT_MAX_OUTPUT_BYTES;

/// Instructions executed between clock samples in the deadline hook. One
/// monotonic-clock read per stride keeps syscall overhead off the dispatch
/// path.
pub const TIMEOUT_CHECK_STRIDE: u32 = 1024;

/// Error message raised into the interpreter when the deadline passes.
pub const TIMEOUT_ERROR_MESSAGE: &str = "execution timeout exceeded";

/// Per-session resource limits. `None` means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Wall-clock budget per eval, measured only while sandbox bytecode is
    /// executing. Time spent inside host tool callbacks is not counted.
    pub timeout: Option<Duration>,
    /// Cap on interpreter heap bytes while an eval is running.
    pub memory_limit: Option<usize>,
    /// Cap on captured print output per eval.
    pub max_output_bytes: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            timeout: None,
            memory_limit: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl SessionLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }
}

/// Monotonic deadline with a latched expired flag.
///
/// Shared between the session and the instruction hook. Once the deadline
/// has passed, [`Deadline::due`] keeps returning true so a script-level
/// error handler cannot swallow the timeout and keep running.
#[derive(Debug, Default)]
pub struct Deadline {
    at: Cell<Option<Instant>>,
    expired: Cell<bool>,
}

impl Deadline {
    pub fn arm(&self, at: Instant) {
        self.at.set(Some(at));
        self.expired.set(false);
    }

    pub fn clear(&self) {
        self.at.set(None);
        self.expired.set(false);
    }

    /// Sample the clock once; latch and report whether the deadline passed.
    pub fn due(&self) -> bool {
        let Some(at) = self.at.get() else {
            return false;
        };
        if Instant::now() >= at {
            self.expired.set(true);
        }
        self.expired.get()
    }

    /// Whether the deadline fired at any point since it was armed.
    pub fn is_expired(&self) -> bool {
        self.expired.get()
    }
}
