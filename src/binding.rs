use std::{fmt, sync::Arc};

use minijinja::Value;

use crate::{Placeholder, PlaceholderPolicy};

/// Per-render accumulator of bound values.
///
/// An engine configured once (typically holding nothing but a placeholder
/// policy) acts as a factory: every render derives its own empty instance
/// through [`BindingEngine::fresh_instance`], so concurrent renders never
/// share capture state.
pub trait BindingEngine: Send + Sync {
    /// Stores `value` and returns the ordinal assigned to it.
    ///
    /// Ordinals start at 0 and grow by one per call on the same instance.
    fn store_value(&mut self, value: Value) -> usize;

    /// Values stored so far, in ordinal order.
    fn values(&self) -> &[Value];

    /// Placeholder text for the value stored under `ordinal`.
    fn placeholder_for(&self, value: &Value, ordinal: usize) -> String;

    /// Replaces the placeholder policy.
    fn set_placeholder(&mut self, policy: Arc<dyn PlaceholderPolicy>);

    /// A brand-new, empty instance carrying the same configuration.
    fn fresh_instance(&self) -> Box<dyn BindingEngine>;
}

/// [`BindingEngine`] storing values in a `Vec` and formatting placeholders
/// with a [`PlaceholderPolicy`] (`?` unless configured otherwise).
#[derive(Clone)]
pub struct DefaultBindingEngine {
    values: Vec<Value>,
    policy: Arc<dyn PlaceholderPolicy>,
}

impl DefaultBindingEngine {
    pub fn new() -> Self {
        Self::with_placeholder(Placeholder::Question)
    }

    /// Creates an engine formatting placeholders with `policy`
    ///
    /// # Example
    /// ```
    /// use sql_bind_template::{BindingEngine, DefaultBindingEngine, Placeholder, Value};
    ///
    /// let mut engine = DefaultBindingEngine::with_placeholder(Placeholder::Dollar);
    /// let value = Value::from("alice");
    /// let ordinal = engine.store_value(value.clone());
    /// assert_eq!(engine.placeholder_for(&value, ordinal), "$1");
    /// ```
    pub fn with_placeholder(policy: impl PlaceholderPolicy + 'static) -> Self {
        Self {
            values: Vec::new(),
            policy: Arc::new(policy),
        }
    }
}

impl Default for DefaultBindingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultBindingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultBindingEngine")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl BindingEngine for DefaultBindingEngine {
    fn store_value(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }

    fn values(&self) -> &[Value] {
        &self.values
    }

    fn placeholder_for(&self, value: &Value, ordinal: usize) -> String {
        self.policy.placeholder(value, ordinal)
    }

    fn set_placeholder(&mut self, policy: Arc<dyn PlaceholderPolicy>) {
        self.policy = policy;
    }

    fn fresh_instance(&self) -> Box<dyn BindingEngine> {
        Box::new(Self {
            values: Vec::new(),
            policy: Arc::clone(&self.policy),
        })
    }
}

/// A value captured by `bind` during one render.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    /// Zero-based position, equal to the order `bind` was evaluated in.
    pub ordinal: usize,
    /// Text emitted into the SQL in place of the value.
    pub placeholder: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_follow_call_order() {
        let mut engine = DefaultBindingEngine::new();
        assert_eq!(engine.store_value(Value::from("x")), 0);
        assert_eq!(engine.store_value(Value::from("y")), 1);
        assert_eq!(engine.store_value(Value::from("z")), 2);
        assert_eq!(
            engine.values(),
            &[Value::from("x"), Value::from("y"), Value::from("z")]
        );
    }

    #[test]
    fn default_policy_is_question_mark() {
        let engine = DefaultBindingEngine::default();
        assert_eq!(engine.placeholder_for(&Value::from(1), 5), "?");
    }

    #[test]
    fn fresh_instance_is_empty_and_keeps_policy() {
        let mut factory = DefaultBindingEngine::with_placeholder(Placeholder::Dollar);
        factory.store_value(Value::from("stale"));

        let mut fresh = factory.fresh_instance();
        assert!(fresh.values().is_empty());
        let ordinal = fresh.store_value(Value::from("new"));
        assert_eq!(ordinal, 0);
        assert_eq!(fresh.placeholder_for(&Value::from("new"), ordinal), "$1");
        // the factory keeps its own state
        assert_eq!(factory.values().len(), 1);
    }

    #[test]
    fn set_placeholder_replaces_policy() {
        let mut engine = DefaultBindingEngine::new();
        engine.set_placeholder(Arc::new(|_: &Value, i: usize| format!(":p{i}")));
        assert_eq!(engine.placeholder_for(&Value::UNDEFINED, 3), ":p3");
        assert_eq!(
            engine.fresh_instance().placeholder_for(&Value::UNDEFINED, 0),
            ":p0"
        );
    }
}
