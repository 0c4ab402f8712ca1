use std::{collections::BTreeMap, fmt, sync::Arc};

use minijinja::{UndefinedBehavior, Value};
use serde::Serialize;
use tracing::trace;

use crate::{
    BindingEngine, BoundValue, DefaultBindingEngine, Error, PlaceholderPolicy, Result,
    TemplateSource,
    repository::{Syntax, TemplateFunction, TemplateRepository},
    scope::{Capture, RenderScope},
};

/// Rendered SQL paired with the values bound while rendering it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    sql: String,
    bindings: Vec<BoundValue>,
}

impl RenderResult {
    /// SQL text with one placeholder per bound value.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values in ordinal order, i.e. in the order their placeholders
    /// appear in [`RenderResult::sql`].
    pub fn values(&self) -> impl ExactSizeIterator<Item = &Value> + '_ {
        self.bindings.iter().map(|b| &b.value)
    }

    pub fn bindings(&self) -> &[BoundValue] {
        &self.bindings
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        let values = self.bindings.into_iter().map(|b| b.value).collect();
        (self.sql, values)
    }
}

impl fmt::Display for RenderResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Renders namespaced SQL templates into SQL text plus bound parameters.
///
/// Register every namespace once, then render from any number of threads:
/// each render gets its own binding engine instance and never mutates the
/// registered templates.
pub struct TemplateEngine {
    repository: TemplateRepository,
    binding_engine: Box<dyn BindingEngine>,
}

impl TemplateEngine {
    /// Engine with `?` placeholders and strict undefined handling.
    pub fn new() -> Self {
        EngineBuilder::default().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Registers a namespace from the files of `source` ending in `extension`.
    ///
    /// Registering an existing namespace replaces its templates.
    pub fn register<S>(&self, namespace: &str, source: &S, extension: &str) -> Result<()>
    where
        S: TemplateSource + ?Sized,
    {
        self.repository.register(namespace, source, extension)
    }

    /// Adds helper functions, visible to every namespace.
    pub fn add_functions<I, N>(&self, functions: I) -> Result<()>
    where
        I: IntoIterator<Item = (N, TemplateFunction)>,
        N: Into<String>,
    {
        self.repository
            .add_functions(functions.into_iter().map(|(n, f)| (n.into(), f)))
    }

    /// Renders `template` without input data.
    pub fn render(&self, namespace: &str, template: &str) -> Result<RenderResult> {
        self.render_with_value(namespace, template, Value::UNDEFINED)
    }

    /// Renders `template` with `data` exposed as key lookups.
    ///
    /// # Example
    /// ```
    /// use sql_bind_template::{Embedded, TemplateEngine, Value};
    ///
    /// let engine = TemplateEngine::new();
    /// engine.register(
    ///     "users",
    ///     &Embedded::new([("findById.tsql", "SELECT * FROM users WHERE id={{ bind(Id) }}")]),
    ///     ".tsql",
    /// )?;
    /// let result = engine.render_with_map("users", "findById", [("Id", "1")])?;
    /// assert_eq!(result.sql(), "SELECT * FROM users WHERE id=?");
    /// assert_eq!(result.values().collect::<Vec<_>>(), [&Value::from("1")]);
    /// # Ok::<(), sql_bind_template::Error>(())
    /// ```
    pub fn render_with_map<I, K, V>(
        &self,
        namespace: &str,
        template: &str,
        data: I,
    ) -> Result<RenderResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let map: BTreeMap<String, Value> = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.render_with_value(namespace, template, Value::from_serialize(&map))
    }

    /// Renders `template` with the fields of `record` exposed by name.
    pub fn render_with_record<T>(
        &self,
        namespace: &str,
        template: &str,
        record: &T,
    ) -> Result<RenderResult>
    where
        T: Serialize + ?Sized,
    {
        self.render_with_value(namespace, template, Value::from_serialize(record))
    }

    /// Renders `template` with an already built template value as data.
    pub fn render_with_value(
        &self,
        namespace: &str,
        template: &str,
        data: Value,
    ) -> Result<RenderResult> {
        let group = self.repository.executable(namespace)?;
        let capture = Arc::new(Capture::new(self.binding_engine.fresh_instance()));
        let scope = Value::from_object(RenderScope::new(data, Arc::clone(&capture)));

        let render_error = |source: minijinja::Error| Error::Render {
            namespace: namespace.to_string(),
            template: template.to_string(),
            source,
        };
        let sql = group.render(template, scope).map_err(render_error)?;
        let bindings = capture.finish().map_err(render_error)?;
        trace!(namespace, template, binds = bindings.len(), "rendered template");

        Ok(RenderResult { sql, bindings })
    }

    /// Same as [`TemplateEngine::render`].
    #[inline]
    pub fn parse(&self, namespace: &str, template: &str) -> Result<RenderResult> {
        self.render(namespace, template)
    }

    /// Same as [`TemplateEngine::render_with_map`].
    #[inline]
    pub fn parse_with_map<I, K, V>(
        &self,
        namespace: &str,
        template: &str,
        data: I,
    ) -> Result<RenderResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.render_with_map(namespace, template, data)
    }

    /// Same as [`TemplateEngine::render_with_record`].
    #[inline]
    pub fn parse_with_record<T>(
        &self,
        namespace: &str,
        template: &str,
        record: &T,
    ) -> Result<RenderResult>
    where
        T: Serialize + ?Sized,
    {
        self.render_with_record(namespace, template, record)
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.repository.namespaces()
    }

    /// Template names of `namespace`, in discovery order.
    pub fn template_names(&self, namespace: &str) -> Result<Vec<String>> {
        let group = self.repository.executable(namespace)?;
        Ok(group.entries().iter().map(|e| e.name.clone()).collect())
    }

    pub fn has_template(&self, namespace: &str, template: &str) -> bool {
        self.repository
            .executable(namespace)
            .is_ok_and(|group| group.contains(template))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

/// Configuration for a [`TemplateEngine`].
///
/// `placeholder` and `binding_engine` both configure the binding engine
/// factory; when both are given, they apply in call order.
#[derive(Default)]
pub struct EngineBuilder {
    functions: BTreeMap<String, TemplateFunction>,
    binding_engine: Option<Box<dyn BindingEngine>>,
    syntax: Syntax,
}

impl EngineBuilder {
    /// Adds a helper callable from template bodies.
    pub fn template_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn template_functions<I, N>(mut self, functions: I) -> Self
    where
        I: IntoIterator<Item = (N, TemplateFunction)>,
        N: Into<String>,
    {
        self.functions
            .extend(functions.into_iter().map(|(n, f)| (n.into(), f)));
        self
    }

    /// Replaces the binding engine factory.
    pub fn binding_engine(mut self, engine: impl BindingEngine + 'static) -> Self {
        self.binding_engine = Some(Box::new(engine));
        self
    }

    /// Installs a placeholder policy on the binding engine factory.
    pub fn placeholder(mut self, policy: impl PlaceholderPolicy + 'static) -> Self {
        let mut engine = self
            .binding_engine
            .take()
            .unwrap_or_else(|| Box::new(DefaultBindingEngine::new()));
        engine.set_placeholder(Arc::new(policy));
        self.binding_engine = Some(engine);
        self
    }

    /// How undefined names behave; [`UndefinedBehavior::Strict`] by default,
    /// so a field missing from the input data fails the render.
    pub fn undefined(mut self, behavior: UndefinedBehavior) -> Self {
        self.syntax.undefined = behavior;
        self
    }

    pub fn trim_blocks(mut self, yes: bool) -> Self {
        self.syntax.trim_blocks = yes;
        self
    }

    pub fn lstrip_blocks(mut self, yes: bool) -> Self {
        self.syntax.lstrip_blocks = yes;
        self
    }

    pub fn keep_trailing_newline(mut self, yes: bool) -> Self {
        self.syntax.keep_trailing_newline = yes;
        self
    }

    pub fn build(self) -> TemplateEngine {
        let repository = TemplateRepository::new(self.syntax, self.functions);
        TemplateEngine {
            repository,
            binding_engine: self
                .binding_engine
                .unwrap_or_else(|| Box::new(DefaultBindingEngine::new())),
        }
    }
}
