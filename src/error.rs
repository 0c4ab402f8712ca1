use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors produced while registering or rendering SQL templates.
#[derive(Error, Debug)]
pub enum Error {
    /// The template source collection could not be traversed or read.
    #[error("unable to retrieve template files under `{}`: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A template file is not valid template syntax.
    #[error("unable to parse file `{file}` for namespace `{namespace}`: {source}")]
    Parse {
        namespace: String,
        file: String,
        #[source]
        source: minijinja::Error,
    },
    /// Rendering was requested against a namespace that was never registered.
    #[error("unable to locate namespace `{0}`")]
    UnknownNamespace(String),
    /// The repository could not hand out an executable template group.
    #[error("unable to derive an executable copy: {0}")]
    ExecutableCopy(String),
    /// Template evaluation failed (missing field, helper fault, unknown template).
    #[error("unable to render `{template}` for namespace `{namespace}`: {source}")]
    Render {
        namespace: String,
        template: String,
        #[source]
        source: minijinja::Error,
    },
    /// A bound value could not be encoded as a database argument.
    #[error("unable to encode bound value #{ordinal}: {source}")]
    Encode {
        ordinal: usize,
        #[source]
        source: sqlx::error::BoxDynError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Namespace the failure relates to, when there is one.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Error::Parse { namespace, .. } | Error::Render { namespace, .. } => {
                Some(namespace.as_str())
            }
            Error::UnknownNamespace(namespace) => Some(namespace.as_str()),
            _ => None,
        }
    }
}
