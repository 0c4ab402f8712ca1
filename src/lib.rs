#![doc = include_str!("../README.md")]

use serde::Serialize;

pub use minijinja::{UndefinedBehavior, Value};
pub use sql_bind_template_macro::*;

mod arguments;
mod binding;
mod engine;
mod error;
mod placeholder;
pub mod repository;
mod scope;
pub mod source;

pub use binding::*;
pub use engine::*;
pub use error::*;
pub use placeholder::*;
pub use repository::{TemplateEntry, TemplateFunction};
pub use scope::{BIND, BIND_LIST};
pub use source::{Directory, Embedded, SourceFile, TemplateSource};

/// A record type tied to one template of one namespace.
///
/// Usually derived:
///
/// ```
/// use serde::Serialize;
/// use sql_bind_template::{Embedded, SqlTemplate, TemplateEngine};
///
/// #[derive(Serialize, SqlTemplate)]
/// #[sql(namespace = "users", template = "findByName")]
/// struct FindByName {
///     name: String,
/// }
///
/// let engine = TemplateEngine::new();
/// engine.register(
///     "users",
///     &Embedded::new([("findByName.tsql", "SELECT * FROM users WHERE name={{ bind(name) }}")]),
///     "tsql",
/// )?;
/// let result = FindByName { name: "Bill".into() }.render(&engine)?;
/// assert_eq!(result.sql(), "SELECT * FROM users WHERE name=?");
/// # Ok::<(), sql_bind_template::Error>(())
/// ```
pub trait SqlTemplate: Serialize {
    const NAMESPACE: &'static str;
    const TEMPLATE: &'static str;

    /// Renders the template with `self` as the record.
    fn render(&self, engine: &TemplateEngine) -> Result<RenderResult> {
        engine.render_with_record(Self::NAMESPACE, Self::TEMPLATE, self)
    }
}
