//! Embedded script sandbox runtime.
//!
//! A [`Session`] owns one isolated interpreter plus its enforcement
//! machinery: an instruction-hook deadline, an accounted memory cap, a
//! captured-output buffer, and a bounded registry of host tool functions
//! dispatched through a single trampoline. Evaluations are serial and
//! stateful; everything a snippet defines at the top level is visible to the
//! next one until the session is reset or closed.
//!
//! This crate is the interpreter-facing half of the system. Hosts normally
//! consume the `scriptbox` facade crate instead, which adds the typed error
//! hierarchy, tool-object plumbing, and process-wide limit defaults.

mod interp;
mod limits;
mod output;
mod session;
mod tools;
mod value;

pub use limits::{Deadline, SessionLimits, TIMEOUT_CHECK_STRIDE, TIMEOUT_ERROR_MESSAGE};
pub use output::{OutputBuffer, OutputHandle, DEFAULT_MAX_OUTPUT_BYTES, TRUNCATION_MARKER};
pub use session::{ErrorKind, EvalOutcome, Session, SessionError};
pub use tools::{ToolDispatcher, MAX_TOOL_FUNCTIONS};
pub use value::{MarshalError, Value, MAX_MARSHAL_DEPTH};
