//! The host-facing sandbox: a persistent session plus tool plumbing and the
//! typed limit errors.

use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use scriptbox_core::{ErrorKind, Session, SessionLimits};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::result::EvalResult;
use crate::tools::{ToolTable, Tools};

/// An isolated script interpreter with limits, captured output, and host
/// tools, evaluated serially.
///
/// State persists across [`eval`](Sandbox::eval) calls until
/// [`reset`](Sandbox::reset) or [`close`](Sandbox::close). Dropping the
/// sandbox closes it.
pub struct Sandbox {
    session: Session,
    tools: Rc<ToolTable>,
    config: SandboxConfig,
}

impl Sandbox {
    /// Build a sandbox, optionally exposing an initial tool bundle.
    pub fn new(
        tools: Option<Arc<dyn Tools>>,
        config: SandboxConfig,
    ) -> Result<Self, SandboxError> {
        let session = Session::new(SessionLimits::from(&config))?;
        let table = ToolTable::new();
        let mut sandbox = Self {
            session,
            tools: table.clone(),
            config,
        };
        sandbox.session.set_dispatcher(table)?;
        if let Some(tools) = tools {
            sandbox.expose(tools)?;
        }
        Ok(sandbox)
    }

    /// Open a sandbox, run `f`, and close it on the way out. The sandbox is
    /// also closed if `f` panics (teardown runs on drop during unwind).
    pub fn with_open<R>(
        tools: Option<Arc<dyn Tools>>,
        config: SandboxConfig,
        f: impl FnOnce(&mut Sandbox) -> R,
    ) -> Result<R, SandboxError> {
        let mut sandbox = Sandbox::new(tools, config)?;
        let out = f(&mut sandbox);
        sandbox.close();
        Ok(out)
    }

    /// Evaluate a snippet.
    ///
    /// Script-level failures come back inside the `Ok` result; the two
    /// resource-limit outcomes are re-raised as [`SandboxError::Timeout`]
    /// and [`SandboxError::MemoryLimit`] because they are host-policy
    /// violations rather than script bugs. Either way the sandbox stays
    /// usable.
    pub fn eval(&mut self, code: &str) -> Result<EvalResult, SandboxError> {
        let outcome = self.session.eval(code)?;
        match outcome.kind {
            ErrorKind::Timeout => Err(SandboxError::Timeout {
                message: outcome
                    .error
                    .unwrap_or_else(|| "execution timeout exceeded".to_string()),
            }),
            ErrorKind::MemoryLimit => Err(SandboxError::MemoryLimit {
                message: outcome
                    .error
                    .unwrap_or_else(|| "memory limit exceeded".to_string()),
            }),
            _ => Ok(EvalResult::from_outcome(outcome)),
        }
    }

    /// Evaluate and return the uniform text rendering, folding every
    /// failure (including the typed limit errors) into the same
    /// `Error: <message>` shape an agent's model consumes.
    pub fn eval_rendered(&mut self, code: &str) -> String {
        match self.eval(code) {
            Ok(result) => result.render(),
            Err(err) => format!("Error: {err}"),
        }
    }

    /// Throw away all script-defined state. Limits and exposed tools are
    /// preserved; registered tool functions remain callable.
    pub fn reset(&mut self) -> Result<(), SandboxError> {
        self.session.reset()?;
        debug!("sandbox reset");
        Ok(())
    }

    /// Release the interpreter. Idempotent; any later eval or reset fails
    /// with [`SandboxError::Closed`].
    pub fn close(&mut self) {
        if !self.session.is_closed() {
            self.session.close();
            info!("sandbox closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Expose another tool bundle. Each advertised name becomes callable
    /// from script code; a name already exposed is re-routed to the new
    /// bundle.
    pub fn expose(&mut self, tools: Arc<dyn Tools>) -> Result<(), SandboxError> {
        if self.is_closed() {
            return Err(SandboxError::Closed);
        }
        for name in tools.tool_names() {
            self.session.define_function(&name)?;
            self.tools.route(name, tools.clone());
        }
        Ok(())
    }

    /// Effective eval timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    /// Effective memory limit in bytes, if any.
    pub fn memory_limit(&self) -> Option<usize> {
        self.config.memory_limit
    }

    /// Interpreter heap bytes currently in use (zero once closed).
    pub fn used_memory(&self) -> usize {
        self.session.used_memory()
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        self.close();
    }
}
