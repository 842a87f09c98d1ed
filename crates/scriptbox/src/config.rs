//! Sandbox configuration and process-wide limit defaults.

use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scriptbox_core::{SessionLimits, DEFAULT_MAX_OUTPUT_BYTES};

#[derive(Debug, Clone, Copy)]
struct Defaults {
    timeout: Option<Duration>,
    memory_limit: Option<usize>,
}

static DEFAULTS: RwLock<Defaults> = RwLock::new(Defaults {
    timeout: None,
    memory_limit: None,
});

/// Set the process-wide default eval timeout. `None` means unlimited.
/// Applies to sandboxes built from [`SandboxConfig::default`] afterwards.
pub fn set_default_timeout(timeout: Option<Duration>) {
    DEFAULTS
        .write()
        .expect("sandbox defaults lock poisoned")
        .timeout = timeout;
}

/// Set the process-wide default memory limit in bytes. `None` means
/// unlimited.
pub fn set_default_memory_limit(bytes: Option<usize>) {
    DEFAULTS
        .write()
        .expect("sandbox defaults lock poisoned")
        .memory_limit = bytes;
}

/// Per-sandbox limits. `None` means unlimited; [`Default`] picks up the
/// process-wide defaults at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub timeout: Option<Duration>,
    pub memory_limit: Option<usize>,
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let defaults = *DEFAULTS.read().expect("sandbox defaults lock poisoned");
        Self {
            timeout: defaults.timeout,
            memory_limit: defaults.memory_limit,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl SandboxConfig {
    /// Configuration with no limits at all, ignoring process defaults.
    pub fn unlimited() -> Self {
        Self {
            timeout: None,
            memory_limit: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_memory_limit(mut self, bytes: Option<usize>) -> Self {
        self.memory_limit = bytes;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

impl From<&SandboxConfig> for SessionLimits {
    fn from(config: &SandboxConfig) -> Self {
        SessionLimits {
            timeout: config.timeout,
            memory_limit: config.memory_limit,
            max_output_bytes: config.max_output_bytes,
        }
    }
}
