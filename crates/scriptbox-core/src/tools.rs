//! Tool dispatch contract between the sandbox and the host.
//!
//! Every function name registered into a session routes through a single
//! host-side dispatcher. The dispatcher receives the invoked name and the
//! marshalled argument vector; its return value is marshalled back into the
//! interpreter, and its error is raised as a script-level runtime error.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// Hard cap on sandbox-visible function names per session.
pub const MAX_TOOL_FUNCTIONS: usize = 64;

/// Host callback invoked by the trampoline for every registered function.
///
/// Implementations run synchronously on the session's thread, inside an
/// interpreter call frame: the active deadline and memory cap still apply to
/// the marshalling of whatever they return.
pub trait ToolDispatcher {
    fn dispatch(&self, name: &str, args: Vec<Value>) -> anyhow::Result<Value>;
}

/// Dispatcher slot shared with the trampoline closures living inside the
/// interpreter. Empty until the host installs a dispatcher; a tool call with
/// no dispatcher raises a runtime error into the script.
pub(crate) type DispatcherSlot = Rc<RefCell<Option<Rc<dyn ToolDispatcher>>>>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ToolDispatcher for Echo {
        fn dispatch(&self, name: &str, args: Vec<Value>) -> anyhow::Result<Value> {
            match name {
                "first" => Ok(args.into_iter().next().unwrap_or(Value::Nil)),
                other => anyhow::bail!("unknown tool: {other}"),
            }
        }
    }

    #[test]
    fn test_dispatch_known_name() {
        let echo = Echo;
        let out = echo.dispatch("first", vec![Value::Int(7)]).unwrap();
        assert_eq!(out, Value::Int(7));
    }

    #[test]
    fn test_dispatch_unknown_name_errors() {
        let echo = Echo;
        let err = echo.dispatch("missing", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }
}
