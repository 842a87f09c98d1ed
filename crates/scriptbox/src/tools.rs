//! Host tool surface: the `Tools` trait, a closure-based tool set, and the
//! dispatch table that routes sandbox calls back to the owning tool object.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, warn};

use scriptbox_core::{ToolDispatcher, Value};

/// A bundle of host functions to expose inside the sandbox.
///
/// Implementations advertise their callable names and handle calls by name.
/// Errors returned from [`Tools::call_tool`] surface inside the sandbox as
/// script-level runtime errors carrying the error's message, so tools should
/// fail with messages an agent can act on.
pub trait Tools {
    /// Names this bundle makes callable, in the order to register them.
    fn tool_names(&self) -> Vec<String>;

    /// Handle a call to one of the advertised names.
    fn call_tool(&self, name: &str, args: Vec<Value>) -> anyhow::Result<Value>;
}

type ToolFn = Box<dyn Fn(Vec<Value>) -> anyhow::Result<Value>>;

/// Closure-based [`Tools`] implementation for free-function-style tools.
///
/// ```
/// use scriptbox::{ToolSet, Value};
///
/// let tools = ToolSet::new().with("double", |args| match args.first() {
///     Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
///     other => anyhow::bail!("double expects an integer, got {other:?}"),
/// });
/// ```
#[derive(Default)]
pub struct ToolSet {
    tools: Vec<(String, ToolFn)>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named tool. Later additions with the same name win.
    pub fn with(
        mut self,
        name: impl Into<String>,
        f: impl Fn(Vec<Value>) -> anyhow::Result<Value> + 'static,
    ) -> Self {
        self.tools.push((name.into(), Box::new(f)));
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Tools for ToolSet {
    fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|(name, _)| name.clone()).collect()
    }

    fn call_tool(&self, name: &str, args: Vec<Value>) -> anyhow::Result<Value> {
        let handler = self
            .tools
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
            .ok_or_else(|| anyhow!("unknown tool: {name}"))?;
        handler(args)
    }
}

/// Routes each registered function name to the tool bundle that owns it.
/// Shared with the session's trampoline as the single host dispatcher.
#[derive(Default)]
pub(crate) struct ToolTable {
    routes: RefCell<HashMap<String, Arc<dyn Tools>>>,
}

impl ToolTable {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn route(&self, name: String, tools: Arc<dyn Tools>) {
        let mut routes = self.routes.borrow_mut();
        if routes.insert(name.clone(), tools).is_some() {
            warn!("tool function '{name}' re-exposed; replacing previous route");
        } else {
            debug!("routing tool function: {name}");
        }
    }
}

impl ToolDispatcher for ToolTable {
    fn dispatch(&self, name: &str, args: Vec<Value>) -> anyhow::Result<Value> {
        let tools = self
            .routes
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("no tool registered for '{name}'"))?;
        tools.call_tool(name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubler() -> ToolSet {
        ToolSet::new().with("double", |args| match args.first() {
            Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
            other => anyhow::bail!("double expects an integer, got {other:?}"),
        })
    }

    #[test]
    fn test_tool_set_names_in_order() {
        let tools = ToolSet::new()
            .with("b", |_| Ok(Value::Nil))
            .with("a", |_| Ok(Value::Nil));
        assert_eq!(tools.tool_names(), ["b", "a"]);
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn test_tool_set_call() {
        let tools = doubler();
        let out = tools.call_tool("double", vec![Value::Int(21)]).unwrap();
        assert_eq!(out, Value::Int(42));
    }

    #[test]
    fn test_tool_set_unknown_name() {
        let tools = doubler();
        let err = tools.call_tool("missing", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn test_tool_set_duplicate_name_later_wins() {
        let tools = ToolSet::new()
            .with("f", |_| Ok(Value::Int(1)))
            .with("f", |_| Ok(Value::Int(2)));
        let out = tools.call_tool("f", Vec::new()).unwrap();
        assert_eq!(out, Value::Int(2));
    }

    #[test]
    fn test_table_routes_by_name() {
        let table = ToolTable::new();
        table.route("double".to_string(), Arc::new(doubler()));
        let out = table.dispatch("double", vec![Value::Int(4)]).unwrap();
        assert_eq!(out, Value::Int(8));
    }

    #[test]
    fn test_table_unrouted_name() {
        let table = ToolTable::new();
        let err = table.dispatch("nope", Vec::new()).unwrap_err();
        assert!(err.to_string().contains("no tool registered"));
    }

    #[test]
    fn test_table_replace_route() {
        let table = ToolTable::new();
        table.route(
            "f".to_string(),
            Arc::new(ToolSet::new().with("f", |_| Ok(Value::Int(1)))),
        );
        table.route(
            "f".to_string(),
            Arc::new(ToolSet::new().with("f", |_| Ok(Value::Int(2)))),
        );
        assert_eq!(table.dispatch("f", Vec::new()).unwrap(), Value::Int(2));
    }
}
