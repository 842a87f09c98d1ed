//! Persistent sandbox session: one interpreter, one output buffer, one set
//! of limits, evaluated serially.
//!
//! State defined by one eval (top-level bindings, function definitions, the
//! `_` last-result binding) is visible to every later eval on the same
//! session until `reset` or `close`. All sandbox-originating failures are
//! reported through [`EvalOutcome`]; the only host-level errors out of
//! [`Session::eval`] are use-after-close and interpreter-embedding faults.

use std::rc::Rc;
use std::time::Instant;

use mlua::{Function, HookTriggers, Lua, MultiValue, Value as LuaValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::interp;
use crate::limits::{Deadline, SessionLimits, TIMEOUT_CHECK_STRIDE, TIMEOUT_ERROR_MESSAGE};
use crate::output::{OutputBuffer, OutputHandle};
use crate::tools::{DispatcherSlot, ToolDispatcher, MAX_TOOL_FUNCTIONS};

/// Discriminates why an eval failed, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    None,
    Runtime,
    Timeout,
    MemoryLimit,
}

/// Result record for one eval. `value` is present iff no error; `output` is
/// always present (possibly empty); `error` is present iff an error
/// occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub value: Option<String>,
    pub output: String,
    pub error: Option<String>,
    pub kind: ErrorKind,
}

impl EvalOutcome {
    pub fn is_error(&self) -> bool {
        self.kind != ErrorKind::None
    }
}

/// Host-level session failures. Sandbox-originating failures never surface
/// here; they are carried in [`EvalOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("too many tool functions (max {max})")]
    TooManyTools { max: usize },

    #[error("interpreter error: {0}")]
    Engine(String),
}

/// A persistent, isolated interpreter session.
pub struct Session {
    vm: Option<Lua>,
    limits: SessionLimits,
    output: OutputHandle,
    deadline: Rc<Deadline>,
    dispatcher: DispatcherSlot,
    tool_names: Vec<String>,
    evals: u64,
}

impl Session {
    /// Create a session with a live interpreter, print capture installed,
    /// and `_` unbound. Memory accounting is active from the first
    /// interpreter allocation; the cap is only applied while an eval runs.
    pub fn new(limits: SessionLimits) -> Result<Self, SessionError> {
        let output = OutputBuffer::handle(limits.max_output_bytes);
        let vm = interp::build_vm(&output).map_err(engine_error)?;
        debug!(
            timeout = ?limits.timeout,
            memory_limit = ?limits.memory_limit,
            "sandbox session created"
        );
        Ok(Self {
            vm: Some(vm),
            limits,
            output,
            deadline: Rc::new(Deadline::default()),
            dispatcher: DispatcherSlot::default(),
            tool_names: Vec::new(),
            evals: 0,
        })
    }

    /// Evaluate one snippet. Never returns a host error for anything the
    /// script itself did; parse errors, runtime errors, and limit trips are
    /// all data on the returned [`EvalOutcome`].
    pub fn eval(&mut self, code: &str) -> Result<EvalOutcome, SessionError> {
        let vm = self.vm.as_ref().ok_or(SessionError::Closed)?;

        self.output.borrow_mut().clear();
        arm(vm, &self.limits, &self.deadline).map_err(engine_error)?;

        self.evals += 1;
        let chunk_name = format!("eval:{}", self.evals);

        let function = match compile(vm, code, &chunk_name) {
            Ok(f) => f,
            Err(err) => {
                disarm(vm);
                return Ok(EvalOutcome {
                    value: None,
                    output: self.output.borrow().snapshot(),
                    error: Some(format!("SyntaxError: {}", syntax_message(&err))),
                    kind: ErrorKind::Runtime,
                });
            }
        };

        let ran: mlua::Result<MultiValue> = function.call(());
        disarm(vm);

        let output = self.output.borrow().snapshot();

        let outcome = match ran {
            Err(err) => {
                let kind = if self.deadline.is_expired() {
                    ErrorKind::Timeout
                } else if is_memory_error(&err) {
                    ErrorKind::MemoryLimit
                } else {
                    ErrorKind::Runtime
                };
                if kind != ErrorKind::Runtime {
                    warn!(?kind, "sandbox eval hit a resource limit");
                }
                EvalOutcome {
                    value: None,
                    output,
                    error: Some(root_message(&err)),
                    kind,
                }
            }
            Ok(values) => {
                let values = values.into_vec();
                let rendered = interp::inspect_multi(&values);
                let last = values.into_iter().next().unwrap_or(LuaValue::Nil);
                if let Err(err) = vm.globals().set("_", last) {
                    warn!("failed to bind last result: {err}");
                }
                EvalOutcome {
                    value: Some(rendered),
                    output,
                    error: None,
                    kind: ErrorKind::None,
                }
            }
        };

        // Collect the eval's garbage now so the counter is honest before the
        // cap is armed again.
        let _ = vm.gc_collect();
        Ok(outcome)
    }

    /// Replace the interpreter wholesale. User-defined state is gone;
    /// limits, the dispatcher, and every registered tool name carry over,
    /// and the names are re-registered into the fresh interpreter.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.vm.is_none() {
            return Err(SessionError::Closed);
        }
        self.output.borrow_mut().clear();
        let vm = interp::build_vm(&self.output).map_err(engine_error)?;
        for name in &self.tool_names {
            interp::register_tool(&vm, name, &self.dispatcher).map_err(engine_error)?;
        }
        self.vm = Some(vm);
        self.evals = 0;
        self.deadline.clear();
        debug!(
            tools = self.tool_names.len(),
            "sandbox session reset; tool functions re-registered"
        );
        Ok(())
    }

    /// Release the interpreter and captured output. Idempotent; every other
    /// operation on a closed session fails with [`SessionError::Closed`].
    pub fn close(&mut self) {
        if self.vm.take().is_some() {
            self.output.borrow_mut().clear();
            debug!("sandbox session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.vm.is_none()
    }

    /// Install the host dispatcher the trampoline routes every registered
    /// function through.
    pub fn set_dispatcher(&mut self, dispatcher: Rc<dyn ToolDispatcher>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        *self.dispatcher.borrow_mut() = Some(dispatcher);
        Ok(())
    }

    /// Make `name` callable from sandbox code. The name survives reset.
    /// Registering a name twice refreshes its trampoline without consuming
    /// another slot.
    pub fn define_function(&mut self, name: &str) -> Result<(), SessionError> {
        let vm = self.vm.as_ref().ok_or(SessionError::Closed)?;
        let known = self.tool_names.iter().any(|n| n == name);
        if !known && self.tool_names.len() >= MAX_TOOL_FUNCTIONS {
            return Err(SessionError::TooManyTools {
                max: MAX_TOOL_FUNCTIONS,
            });
        }
        interp::register_tool(vm, name, &self.dispatcher).map_err(engine_error)?;
        if !known {
            self.tool_names.push(name.to_string());
        }
        debug!("registered sandbox function: {name}");
        Ok(())
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// Names currently callable from sandbox code, in registration order.
    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    /// Interpreter heap bytes currently accounted for. Zero once closed.
    pub fn used_memory(&self) -> usize {
        self.vm.as_ref().map(Lua::used_memory).unwrap_or(0)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn engine_error(err: mlua::Error) -> SessionError {
    SessionError::Engine(err.to_string())
}

/// Arm enforcement for one eval: apply the memory cap and, when a timeout is
/// configured, install the instruction hook against a fresh deadline.
fn arm(vm: &Lua, limits: &SessionLimits, deadline: &Rc<Deadline>) -> mlua::Result<()> {
    vm.set_memory_limit(limits.memory_limit.unwrap_or(0))?;

    vm.remove_hook();
    deadline.clear();
    if let Some(timeout) = limits.timeout {
        if !timeout.is_zero() {
            deadline.arm(Instant::now() + timeout);
            let deadline = deadline.clone();
            vm.set_hook(
                HookTriggers::new().every_nth_instruction(TIMEOUT_CHECK_STRIDE),
                move |_, _| {
                    if deadline.due() {
                        Err(mlua::Error::RuntimeError(TIMEOUT_ERROR_MESSAGE.to_string()))
                    } else {
                        Ok(())
                    }
                },
            );
        }
    }
    Ok(())
}

/// Stop enforcing: drop the hook and lift the memory cap. Accounting stays
/// active so post-run inspection is still counted, just never capped. The
/// deadline's expired flag is left alone; classification reads it after
/// disarm and the next arm clears it.
fn disarm(vm: &Lua) {
    vm.remove_hook();
    if vm.set_memory_limit(0).is_err() {
        warn!("failed to lift sandbox memory cap");
    }
}

/// Compile a snippet REPL-style: as an expression first (so `1 + 1` has a
/// value), then as a plain chunk.
fn compile<'lua>(vm: &'lua Lua, code: &str, name: &str) -> mlua::Result<Function<'lua>> {
    let as_expression = format!("return {code}");
    match vm.load(&as_expression).set_name(name).into_function() {
        Ok(f) => Ok(f),
        Err(_) => vm.load(code).set_name(name).into_function(),
    }
}

fn syntax_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn is_memory_error(err: &mlua::Error) -> bool {
    match err {
        mlua::Error::MemoryError(_) => true,
        mlua::Error::CallbackError { cause, .. } => is_memory_error(cause),
        _ => false,
    }
}

/// Root error message, with interpreter tracebacks trimmed off.
fn root_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::CallbackError { cause, .. } => root_message(cause),
        mlua::Error::RuntimeError(message) => message
            .split("\nstack traceback:")
            .next()
            .unwrap_or(message)
            .to_string(),
        other => other.to_string(),
    }
}
