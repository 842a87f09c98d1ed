//! A resource-limited embedded script sandbox for AI-agent code execution.
//!
//! The sandbox embeds an isolated script interpreter in the host process and
//! exposes it as a stateful evaluation service: an agent can run snippets
//! that build on each other, call back into a curated set of host tools, and
//! nothing it does can reach the filesystem, network, environment, or
//! process table. Wall-clock and memory budgets are enforced from inside the
//! interpreter, so a runaway snippet errors out and the sandbox stays
//! usable.
//!
//! ```
//! use scriptbox::{Sandbox, SandboxConfig};
//!
//! let mut sandbox = Sandbox::new(None, SandboxConfig::unlimited()).unwrap();
//!
//! let result = sandbox.eval("x = 21").unwrap();
//! assert!(!result.is_error());
//!
//! let result = sandbox.eval("x * 2").unwrap();
//! assert_eq!(result.value.as_deref(), Some("42"));
//! assert_eq!(result.render(), "=> 42");
//! ```
//!
//! Host tools are plain Rust callables exchanging [`Value`]s:
//!
//! ```
//! use std::sync::Arc;
//! use scriptbox::{Sandbox, SandboxConfig, ToolSet, Value};
//!
//! let tools = ToolSet::new().with("double", |args| match args.first() {
//!     Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
//!     other => anyhow::bail!("double expects an integer, got {other:?}"),
//! });
//!
//! let mut sandbox = Sandbox::new(Some(Arc::new(tools)), SandboxConfig::unlimited()).unwrap();
//! assert_eq!(sandbox.eval("double(21)").unwrap().value.as_deref(), Some("42"));
//! ```

mod config;
mod error;
mod result;
mod sandbox;
mod tools;

pub mod json;

pub use config::{set_default_memory_limit, set_default_timeout, SandboxConfig};
pub use error::SandboxError;
pub use result::EvalResult;
pub use sandbox::Sandbox;
pub use tools::{ToolSet, Tools};

pub use scriptbox_core::{ErrorKind, MarshalError, Value, MAX_TOOL_FUNCTIONS};
