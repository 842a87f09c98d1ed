//! Interpreter embedding: restricted VM construction, print-family capture,
//! inspect forms, and value marshalling.
//!
//! This is the only module that talks to `mlua` types directly. The VM is
//! built with a stdlib subset that has no filesystem, process, environment,
//! or module-loading surface, and the few dangerous base-library globals are
//! removed afterwards. Swapping the embedded interpreter means replacing
//! this module; the rest of the crate sees only [`crate::value::Value`] and
//! opaque handles.

use mlua::{Lua, LuaOptions, StdLib, Table, Value as LuaValue, Variadic};
use tracing::debug;

use crate::output::OutputHandle;
use crate::tools::DispatcherSlot;
use crate::value::{MarshalError, Value, MAX_MARSHAL_DEPTH};

/// Base-library globals removed from every sandbox VM. The io/os/package/
/// debug libraries are never loaded at all; these live in the base library,
/// which the binding always opens.
///
/// `load`/`loadstring` accept precompiled chunks, which the VM executes
/// without verification; `collectgarbage` lets scripts stop the collector;
/// `warn` writes to host stderr.
const DEFANGED_GLOBALS: &[&str] = &[
    "dofile",
    "loadfile",
    "load",
    "loadstring",
    "collectgarbage",
    "warn",
];

/// Nesting cutoff for inspect forms; past this tables render as `{...}`,
/// which also keeps cyclic tables printable.
const MAX_INSPECT_DEPTH: usize = 8;

/// Build a restricted interpreter wired to the session's output buffer.
///
/// The stdlib subset is table/string/utf8/math plus the base library. The
/// coroutine library is deliberately absent: the deadline hook is installed
/// on the main execution thread, and code running on a coroutine thread
/// would escape it.
pub(crate) fn build_vm(output: &OutputHandle) -> mlua::Result<Lua> {
    let vm = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH,
        LuaOptions::default(),
    )?;

    {
        let globals = vm.globals();
        for name in DEFANGED_GLOBALS {
            globals.raw_set(*name, LuaValue::Nil)?;
        }
    }

    install_print_family(&vm, output)?;
    debug!("sandbox interpreter constructed");
    Ok(vm)
}

/// Replace the print family with buffer-backed versions.
///
/// `print` keeps the interpreter's native shape (tab-separated arguments,
/// trailing newline). `puts` writes one line per argument, expanding
/// sequence arguments element-wise. `p` writes the inspect form of each
/// argument and returns the original value(s).
fn install_print_family(vm: &Lua, output: &OutputHandle) -> mlua::Result<()> {
    let globals = vm.globals();

    let handle = output.clone();
    let print = vm.create_function(move |_, args: Variadic<LuaValue>| {
        let rendered: Vec<Vec<u8>> = args.iter().map(display_bytes).collect();
        let mut buf = handle.borrow_mut();
        for (i, piece) in rendered.iter().enumerate() {
            if i > 0 {
                buf.write(b"\t");
            }
            buf.write(piece);
        }
        buf.write(b"\n");
        Ok(())
    })?;
    globals.set("print", print)?;

    let handle = output.clone();
    let puts = vm.create_function(move |_, args: Variadic<LuaValue>| {
        let mut lines: Vec<Vec<u8>> = Vec::new();
        for arg in args.iter() {
            match arg {
                LuaValue::Table(t) => {
                    let len = t.raw_len() as i64;
                    for i in 1..=len {
                        let item: LuaValue = t.raw_get(i)?;
                        lines.push(display_bytes(&item));
                    }
                }
                other => lines.push(display_bytes(other)),
            }
        }
        let mut buf = handle.borrow_mut();
        if args.is_empty() {
            buf.write(b"\n");
        }
        for line in &lines {
            buf.write_line(line);
        }
        Ok(())
    })?;
    globals.set("puts", puts)?;

    let handle = output.clone();
    let p = vm.create_function(move |_, args: Variadic<LuaValue>| {
        let rendered: Vec<String> = args.iter().map(inspect_value).collect();
        {
            let mut buf = handle.borrow_mut();
            for piece in &rendered {
                buf.write(piece.as_bytes());
                buf.write(b"\n");
            }
        }
        Ok(args)
    })?;
    globals.set("p", p)?;

    Ok(())
}

/// Register a trampoline global for `name`.
///
/// All registered names share the dispatcher slot; the closure marshals the
/// call frame's arguments out, invokes the dispatcher, and marshals the
/// result back. Host errors and unsupported argument types surface as
/// script-level runtime errors.
pub(crate) fn register_tool(vm: &Lua, name: &str, slot: &DispatcherSlot) -> mlua::Result<()> {
    let tool_name = name.to_string();
    let slot = slot.clone();
    let trampoline = vm.create_function(move |lua, args: Variadic<LuaValue>| {
        let dispatcher = slot.borrow().clone();
        let Some(dispatcher) = dispatcher else {
            return Err(mlua::Error::RuntimeError(
                "no tool callback registered".to_string(),
            ));
        };

        let mut call_args = Vec::with_capacity(args.len());
        for arg in args.iter() {
            match lua_to_value(arg, 0) {
                Ok(v) => call_args.push(v),
                Err(e) => return Err(mlua::Error::RuntimeError(e.to_string())),
            }
        }

        match dispatcher.dispatch(&tool_name, call_args) {
            Ok(value) => value_to_lua(lua, &value, 0),
            Err(e) => Err(mlua::Error::RuntimeError(format!("{e:#}"))),
        }
    })?;
    vm.globals().set(name, trampoline)?;
    Ok(())
}

/// Convert an interpreter value into the boundary lattice.
///
/// Tables whose keys are exactly `1..=n` become lists; any other table
/// becomes a map whose entries follow the interpreter's iteration order.
pub(crate) fn lua_to_value(value: &LuaValue, depth: usize) -> Result<Value, MarshalError> {
    if depth > MAX_MARSHAL_DEPTH {
        return Err(MarshalError::DepthExceeded);
    }
    match value {
        LuaValue::Nil => Ok(Value::Nil),
        LuaValue::Boolean(b) => Ok(Value::Bool(*b)),
        LuaValue::Integer(i) => Ok(Value::Int(*i)),
        LuaValue::Number(n) => Ok(Value::Float(*n)),
        LuaValue::String(s) => Ok(Value::Str(s.as_bytes().to_vec())),
        LuaValue::Table(t) => table_to_value(t, depth),
        other => Err(MarshalError::UnsupportedType(other.type_name().to_string())),
    }
}

fn table_to_value(table: &Table, depth: usize) -> Result<Value, MarshalError> {
    let seq_len = table.raw_len() as i64;
    let mut entries: Vec<(Value, Value)> = Vec::new();
    let mut extra = 0usize;

    for pair in table.clone().pairs::<LuaValue, LuaValue>() {
        let (k, v) = pair.map_err(|e| MarshalError::UnsupportedType(e.to_string()))?;
        let in_sequence = matches!(&k, LuaValue::Integer(i) if *i >= 1 && *i <= seq_len);
        if !in_sequence {
            extra += 1;
        }
        entries.push((lua_to_value(&k, depth + 1)?, lua_to_value(&v, depth + 1)?));
    }

    if extra == 0 && entries.len() == seq_len as usize {
        // Pure sequence: the array part iterates in index order.
        Ok(Value::List(entries.into_iter().map(|(_, v)| v).collect()))
    } else {
        Ok(Value::Map(entries))
    }
}

/// Convert a lattice value into an interpreter value.
pub(crate) fn value_to_lua<'lua>(
    lua: &'lua Lua,
    value: &Value,
    depth: usize,
) -> mlua::Result<LuaValue<'lua>> {
    if depth > MAX_MARSHAL_DEPTH {
        return Err(mlua::Error::RuntimeError(
            MarshalError::DepthExceeded.to_string(),
        ));
    }
    match value {
        Value::Nil => Ok(LuaValue::Nil),
        Value::Bool(b) => Ok(LuaValue::Boolean(*b)),
        Value::Int(i) => Ok(LuaValue::Integer(*i)),
        Value::Float(n) => Ok(LuaValue::Number(*n)),
        Value::Str(bytes) => Ok(LuaValue::String(lua.create_string(bytes)?)),
        Value::List(items) => {
            let table = lua.create_table()?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i as i64 + 1, value_to_lua(lua, item, depth + 1)?)?;
            }
            Ok(LuaValue::Table(table))
        }
        Value::Map(entries) => {
            let table = lua.create_table()?;
            for (k, v) in entries {
                table.raw_set(
                    value_to_lua(lua, k, depth + 1)?,
                    value_to_lua(lua, v, depth + 1)?,
                )?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}

/// Canonical debug representation of an interpreter value, REPL-style:
/// strings quoted and escaped, tables rendered recursively with a depth
/// cutoff, reference types by kind.
pub(crate) fn inspect_value(value: &LuaValue) -> String {
    inspect_depth(value, 0)
}

/// Inspect form of a whole return list. Empty renders as `nil`; multiple
/// return values are comma-separated.
pub(crate) fn inspect_multi(values: &[LuaValue]) -> String {
    if values.is_empty() {
        return "nil".to_string();
    }
    values
        .iter()
        .map(inspect_value)
        .collect::<Vec<_>>()
        .join(", ")
}

fn inspect_depth(value: &LuaValue, depth: usize) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => format_float(*n),
        LuaValue::String(s) => quote_bytes(s.as_bytes()),
        LuaValue::Table(t) => inspect_table(t, depth),
        other => format!("<{}>", other.type_name()),
    }
}

fn inspect_table(table: &Table, depth: usize) -> String {
    if depth >= MAX_INSPECT_DEPTH {
        return "{...}".to_string();
    }

    let seq_len = table.raw_len() as i64;
    let mut parts: Vec<String> = Vec::new();

    for i in 1..=seq_len {
        match table.raw_get::<_, LuaValue>(i) {
            Ok(v) => parts.push(inspect_depth(&v, depth + 1)),
            Err(_) => parts.push("...".to_string()),
        }
    }

    for pair in table.clone().pairs::<LuaValue, LuaValue>() {
        let Ok((k, v)) = pair else { continue };
        if matches!(&k, LuaValue::Integer(i) if *i >= 1 && *i <= seq_len) {
            continue;
        }
        let key = match &k {
            LuaValue::String(s) if is_identifier(s.as_bytes()) => {
                String::from_utf8_lossy(s.as_bytes()).into_owned()
            }
            other => format!("[{}]", inspect_depth(other, depth + 1)),
        };
        parts.push(format!("{} = {}", key, inspect_depth(&v, depth + 1)));
    }

    format!("{{{}}}", parts.join(", "))
}

fn is_identifier(bytes: &[u8]) -> bool {
    !bytes.is_empty()
        && !bytes[0].is_ascii_digit()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

/// Stringify a value the way the print routines do: strings raw, numbers in
/// their canonical form, containers in inspect form.
pub(crate) fn display_bytes(value: &LuaValue) -> Vec<u8> {
    match value {
        LuaValue::String(s) => s.as_bytes().to_vec(),
        LuaValue::Nil => b"nil".to_vec(),
        LuaValue::Boolean(b) => b.to_string().into_bytes(),
        LuaValue::Integer(i) => i.to_string().into_bytes(),
        LuaValue::Number(n) => format_float(*n).into_bytes(),
        other => inspect_value(other).into_bytes(),
    }
}

/// Float rendering that keeps integral floats visibly floats (`2.0`, not
/// `2`), matching the interpreter's own convention.
pub(crate) fn format_float(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e16 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

fn quote_bytes(bytes: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len() + 2);
    out.push(b'"');
    for &b in bytes {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x00..=0x1f | 0x7f => out.extend_from_slice(format!("\\{b}").as_bytes()),
            _ => out.push(b),
        }
    }
    out.push(b'"');
    String::from_utf8_lossy(&out).into_owned()
}
