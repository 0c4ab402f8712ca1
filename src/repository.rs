use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value, value::Rest};
use tracing::{debug, warn};

use crate::{Error, Result, TemplateSource};

/// A helper callable from template bodies.
///
/// Receives the positional arguments of the call.
pub type TemplateFunction =
    Arc<dyn Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static>;

/// Syntax settings applied to every namespace environment.
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    pub undefined: UndefinedBehavior,
    pub trim_blocks: bool,
    pub lstrip_blocks: bool,
    pub keep_trailing_newline: bool,
}

impl Default for Syntax {
    fn default() -> Self {
        Self {
            undefined: UndefinedBehavior::Strict,
            trim_blocks: false,
            lstrip_blocks: false,
            keep_trailing_newline: false,
        }
    }
}

/// A parsed template file. Never mutated after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    /// Name the template is rendered and included by.
    pub name: String,
    /// Path of the source file relative to its collection root.
    pub path: String,
    pub source: String,
}

/// Every template of one namespace, parsed into a single environment.
///
/// Shared by `Arc` between the repository and in-flight renders; renders
/// only read it.
pub struct NamespaceGroup {
    namespace: String,
    env: Environment<'static>,
    entries: Vec<TemplateEntry>,
}

impl NamespaceGroup {
    fn build(
        namespace: &str,
        entries: Vec<TemplateEntry>,
        functions: &BTreeMap<String, TemplateFunction>,
        syntax: Syntax,
    ) -> Result<Self> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(syntax.undefined);
        env.set_trim_blocks(syntax.trim_blocks);
        env.set_lstrip_blocks(syntax.lstrip_blocks);
        env.set_keep_trailing_newline(syntax.keep_trailing_newline);

        for (name, function) in functions {
            let function = Arc::clone(function);
            env.add_function(name.clone(), move |args: Rest<Value>| function(&args.0));
        }

        for entry in &entries {
            env.add_template_owned(entry.name.clone(), entry.source.clone())
                .map_err(|source| Error::Parse {
                    namespace: namespace.to_string(),
                    file: entry.path.clone(),
                    source,
                })?;
        }

        Ok(Self {
            namespace: namespace.to_string(),
            env,
            entries,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entries(&self) -> &[TemplateEntry] {
        &self.entries
    }

    pub fn contains(&self, template: &str) -> bool {
        self.entries.iter().any(|e| e.name == template)
    }

    /// Renders `template` with `ctx` as the root context.
    pub(crate) fn render(&self, template: &str, ctx: Value) -> Result<String, minijinja::Error> {
        self.env.get_template(template)?.render(ctx)
    }
}

impl fmt::Debug for NamespaceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceGroup")
            .field("namespace", &self.namespace)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

/// Namespace-indexed store of parsed templates plus the helper functions
/// visible to them.
///
/// Writes (`register`, `add_functions`) are serialized by a lock and meant
/// for setup; reads hand out the shared [`NamespaceGroup`] without copying.
pub struct TemplateRepository {
    groups: RwLock<HashMap<String, Arc<NamespaceGroup>>>,
    functions: RwLock<BTreeMap<String, TemplateFunction>>,
    syntax: Syntax,
}

impl TemplateRepository {
    /// Empty repository whose namespaces will see `functions`.
    pub fn new(syntax: Syntax, functions: BTreeMap<String, TemplateFunction>) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            functions: RwLock::new(functions),
            syntax,
        }
    }

    /// Merges `functions` into the helper set, overwriting on name collision.
    ///
    /// Namespaces registered earlier are rebuilt so the helpers are visible
    /// everywhere.
    pub fn add_functions<I>(&self, functions: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, TemplateFunction)>,
    {
        let mut current = self.functions.write().map_err(poisoned)?;
        let mut groups = self.groups.write().map_err(poisoned)?;
        for (name, function) in functions {
            debug!(%name, "adding template function");
            current.insert(name, function);
        }

        let mut rebuilt = HashMap::with_capacity(groups.len());
        for (namespace, group) in groups.iter() {
            let group =
                NamespaceGroup::build(namespace, group.entries.clone(), &current, self.syntax)?;
            rebuilt.insert(namespace.clone(), Arc::new(group));
        }
        *groups = rebuilt;
        Ok(())
    }

    /// Parses every file of `source` ending in `extension` into the
    /// namespace's group, replacing any group registered under the same name.
    ///
    /// # Errors
    /// - [`Error::Discovery`] if the collection cannot be traversed
    /// - [`Error::Parse`] naming the first file that fails to parse; the
    ///   namespace keeps its previous group in that case
    pub fn register<S>(&self, namespace: &str, source: &S, extension: &str) -> Result<()>
    where
        S: TemplateSource + ?Sized,
    {
        let files = source.discover(extension)?;
        let entries: Vec<TemplateEntry> = files
            .into_iter()
            .map(|file| TemplateEntry {
                name: file.template_name(extension).to_string(),
                path: file.path,
                source: file.contents,
            })
            .collect();
        debug!(
            namespace,
            files = entries.len(),
            names = ?entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            "registering namespace"
        );

        // held until the insert so a concurrent add_functions cannot be missed
        let functions = self.functions.read().map_err(poisoned)?;
        let group = NamespaceGroup::build(namespace, entries, &functions, self.syntax)?;

        let mut groups = self.groups.write().map_err(poisoned)?;
        if groups
            .insert(namespace.to_string(), Arc::new(group))
            .is_some()
        {
            warn!(namespace, "namespace re-registered, previous templates dropped");
        }
        Ok(())
    }

    /// Render-safe handle on the namespace's templates.
    ///
    /// # Errors
    /// [`Error::UnknownNamespace`] if `namespace` was never registered.
    pub fn executable(&self, namespace: &str) -> Result<Arc<NamespaceGroup>> {
        let groups = self.groups.read().map_err(poisoned)?;
        groups
            .get(namespace)
            .cloned()
            .ok_or_else(|| Error::UnknownNamespace(namespace.to_string()))
    }

    /// Registered namespace names, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = groups.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for TemplateRepository {
    fn default() -> Self {
        Self::new(Syntax::default(), BTreeMap::new())
    }
}

impl fmt::Debug for TemplateRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRepository")
            .field("namespaces", &self.namespaces())
            .field("syntax", &self.syntax)
            .finish_non_exhaustive()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> Error {
    Error::ExecutableCopy("template repository lock poisoned".to_string())
}
