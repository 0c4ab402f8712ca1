//! Template file collections.
//!
//! A namespace is registered from a [`TemplateSource`]: either a
//! [`Directory`] walked on disk or an [`Embedded`] set of files compiled
//! into the binary.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::trace;
use walkdir::WalkDir;

use crate::{Error, Result};

/// A template file found in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the collection root, `/`-separated.
    pub path: String,
    pub contents: String,
}

impl SourceFile {
    /// Name the file is resolvable under: its relative path without the
    /// template extension (`admin/find_all.tsql` -> `admin/find_all`).
    pub fn template_name(&self, extension: &str) -> &str {
        let extension = normalize_extension(extension);
        self.path
            .strip_suffix(extension)
            .and_then(|stem| stem.strip_suffix('.'))
            .unwrap_or(&self.path)
    }
}

/// A collection of template files.
pub trait TemplateSource {
    /// Every file whose name ends with `extension`, in lexical path order.
    ///
    /// `extension` is accepted with or without its leading dot.
    fn discover(&self, extension: &str) -> Result<Vec<SourceFile>>;
}

impl<S: TemplateSource + ?Sized> TemplateSource for &S {
    fn discover(&self, extension: &str) -> Result<Vec<SourceFile>> {
        (**self).discover(extension)
    }
}

/// Template files under a directory, searched recursively.
#[derive(Debug, Clone)]
pub struct Directory {
    root: PathBuf,
}

impl Directory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateSource for Directory {
    fn discover(&self, extension: &str) -> Result<Vec<SourceFile>> {
        let extension = normalize_extension(extension);
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| Error::Discovery {
                path: e.path().unwrap_or(&self.root).to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let contents = fs::read_to_string(entry.path()).map_err(|source| Error::Discovery {
                path: entry.path().to_path_buf(),
                source,
            })?;
            trace!(root = %self.root.display(), %path, "discovered template file");
            files.push(SourceFile { path, contents });
        }

        Ok(files)
    }
}

/// Template files held in memory, e.g. pulled in with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct Embedded {
    files: Vec<SourceFile>,
}

impl Embedded {
    /// Builds a collection from `(path, contents)` pairs
    ///
    /// # Example
    /// ```
    /// use sql_bind_template::Embedded;
    ///
    /// let files = Embedded::new([
    ///     ("find_by_id.tsql", "SELECT * FROM users WHERE id = {{ bind(id) }}"),
    ///     ("count.tsql", "SELECT count(*) FROM users"),
    /// ]);
    /// ```
    pub fn new<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        files
            .into_iter()
            .fold(Self::default(), |acc, (path, contents)| acc.file(path, contents))
    }

    /// Adds one file, replacing an earlier file with the same path.
    pub fn file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        let path = path.into().replace('\\', "/");
        let path = path.trim_start_matches("./").to_string();
        let contents = contents.into();
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(existing) => existing.contents = contents,
            None => self.files.push(SourceFile { path, contents }),
        }
        self
    }
}

impl TemplateSource for Embedded {
    fn discover(&self, extension: &str) -> Result<Vec<SourceFile>> {
        let extension = normalize_extension(extension);
        let mut files: Vec<SourceFile> = self
            .files
            .iter()
            .filter(|f| has_extension(Path::new(&f.path), extension))
            .cloned()
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

fn normalize_extension(extension: &str) -> &str {
    extension.trim_start_matches('.')
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn template_name_strips_extension() {
        let file = SourceFile {
            path: "admin/find_all.tsql".into(),
            contents: String::new(),
        };
        assert_eq!(file.template_name(".tsql"), "admin/find_all");
        assert_eq!(file.template_name("tsql"), "admin/find_all");
    }

    #[test]
    fn embedded_filters_and_sorts() {
        let files = Embedded::new([
            ("b.tsql", "B"),
            ("notes.txt", "ignored"),
            ("a.tsql", "A"),
        ])
        .discover(".tsql")
        .unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["a.tsql", "b.tsql"]);
    }

    #[test]
    fn embedded_later_file_replaces_earlier() {
        let files = Embedded::default()
            .file("./q.tsql", "old")
            .file("q.tsql", "new")
            .discover("tsql")
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].contents, "new");
    }

    #[test]
    fn directory_walks_recursively() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("admin")).unwrap();
        fs::write(dir.path().join("find.tsql"), "SELECT 1").unwrap();
        fs::write(dir.path().join("admin").join("all.tsql"), "SELECT 2").unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();

        let files = Directory::new(dir.path()).discover(".tsql").unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["admin/all.tsql", "find.tsql"]);
        assert_eq!(files[1].contents, "SELECT 1");
    }

    #[test]
    fn missing_directory_is_a_discovery_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = Directory::new(&missing).discover(".tsql").unwrap_err();
        assert!(matches!(err, Error::Discovery { .. }));
    }
}
