//! Per-render execution scope.
//!
//! A render never touches the shared template group. Instead it passes a
//! [`RenderScope`] as the template's root context: lookups of ordinary
//! names go to the caller's data, while `bind` and `bind_list` resolve to
//! callables wired to the [`BindingEngine`] instance owned by this render.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex},
};

use minijinja::{
    Error, ErrorKind, State, UndefinedBehavior, Value,
    value::{Object, ObjectRepr},
};

use crate::{BindingEngine, BoundValue};

/// Name of the single-value escape hatch inside template bodies.
pub const BIND: &str = "bind";
/// Name of the sequence escape hatch inside template bodies.
pub const BIND_LIST: &str = "bind_list";

struct Captured {
    engine: Box<dyn BindingEngine>,
    placeholders: Vec<String>,
}

/// Capture state of one render.
pub(crate) struct Capture {
    inner: Mutex<Captured>,
}

impl Capture {
    pub(crate) fn new(engine: Box<dyn BindingEngine>) -> Self {
        Self {
            inner: Mutex::new(Captured {
                engine,
                placeholders: Vec::new(),
            }),
        }
    }

    /// Stores `value` and returns the placeholder to splice into the output.
    fn bind(&self, value: Value) -> Result<String, Error> {
        let mut captured = self.inner.lock().map_err(|_| {
            Error::new(ErrorKind::InvalidOperation, "bind capture state is poisoned")
        })?;
        let captured = &mut *captured;
        let placeholder = catch_unwind(AssertUnwindSafe(|| {
            let ordinal = captured.engine.store_value(value.clone());
            captured.engine.placeholder_for(&value, ordinal)
        }))
        .map_err(|_| Error::new(ErrorKind::InvalidOperation, "placeholder policy panicked"))?;
        captured.placeholders.push(placeholder.clone());
        Ok(placeholder)
    }

    fn bind_list(&self, values: &Value, strict: bool) -> Result<String, Error> {
        let mut out = String::from("(");
        for value in values.try_iter()? {
            if strict && value.is_undefined() {
                return Err(undefined_bind(BIND_LIST));
            }
            out.push_str(&self.bind(value)?);
            out.push(',');
        }
        if out.ends_with(',') {
            out.pop();
        }
        out.push(')');
        Ok(out)
    }

    /// Everything bound during the render, in ordinal order.
    pub(crate) fn finish(&self) -> Result<Vec<BoundValue>, Error> {
        let mut captured = self.inner.lock().map_err(|_| {
            Error::new(ErrorKind::InvalidOperation, "bind capture state is poisoned")
        })?;
        let placeholders = std::mem::take(&mut captured.placeholders);
        let values = captured.engine.values();
        if values.len() != placeholders.len() {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!(
                    "binding engine holds {} values for {} bind calls",
                    values.len(),
                    placeholders.len()
                ),
            ));
        }
        Ok(values
            .iter()
            .cloned()
            .zip(placeholders)
            .enumerate()
            .map(|(ordinal, (value, placeholder))| BoundValue {
                ordinal,
                placeholder,
                value,
            })
            .collect())
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture").finish_non_exhaustive()
    }
}

/// `bind` / `bind_list` as seen from a template body.
#[derive(Debug)]
struct BindFn {
    capture: Arc<Capture>,
    list: bool,
}

impl Object for BindFn {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call(self: &Arc<Self>, state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
        let name = if self.list { BIND_LIST } else { BIND };
        let [value] = args else {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("{name}() takes exactly one argument, got {}", args.len()),
            ));
        };
        // strict mode: an undefined argument fails instead of binding NULL
        let strict = matches!(state.undefined_behavior(), UndefinedBehavior::Strict);
        if strict && value.is_undefined() {
            return Err(undefined_bind(name));
        }
        let placeholder = if self.list {
            self.capture.bind_list(value, strict)?
        } else {
            self.capture.bind(value.clone())?
        };
        Ok(Value::from(placeholder))
    }
}

fn undefined_bind(name: &str) -> Error {
    Error::new(
        ErrorKind::UndefinedError,
        format!("{name}() was given an undefined value"),
    )
}

/// Root context of a single render.
#[derive(Debug)]
pub(crate) struct RenderScope {
    data: Value,
    bind: Value,
    bind_list: Value,
}

impl RenderScope {
    pub(crate) fn new(data: Value, capture: Arc<Capture>) -> Self {
        Self {
            data,
            bind: Value::from_object(BindFn {
                capture: Arc::clone(&capture),
                list: false,
            }),
            bind_list: Value::from_object(BindFn {
                capture,
                list: true,
            }),
        }
    }
}

impl Object for RenderScope {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str() {
            Some(BIND) => Some(self.bind.clone()),
            Some(BIND_LIST) => Some(self.bind_list.clone()),
            _ => match self.data.get_item(key) {
                Ok(value) if !value.is_undefined() => Some(value),
                _ => None,
            },
        }
    }
}
