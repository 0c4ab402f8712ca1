use std::fmt;

use minijinja::Value;

/// Strategy turning a bound value and its zero-based ordinal into the
/// marker left in the rendered SQL.
///
/// Implemented for every `Fn(&Value, usize) -> String + Send + Sync`, so a
/// closure is enough for dialects not covered by [`Placeholder`]:
///
/// ```
/// use sql_bind_template::{PlaceholderPolicy, Value};
///
/// let numbered = |_: &Value, ordinal: usize| format!("${}", ordinal + 1);
/// assert_eq!(numbered.placeholder(&Value::from(7), 2), "$3");
/// ```
pub trait PlaceholderPolicy: Send + Sync {
    fn placeholder(&self, value: &Value, ordinal: usize) -> String;
}

impl<F> PlaceholderPolicy for F
where
    F: Fn(&Value, usize) -> String + Send + Sync,
{
    fn placeholder(&self, value: &Value, ordinal: usize) -> String {
        self(value, ordinal)
    }
}

/// Placeholder styles of common database dialects.
///
/// Numbered styles are 1-based:
/// - `Question`: `?` for every parameter (MySQL, SQLite)
/// - `Dollar`: `$1`, `$2`... (PostgreSQL)
/// - `Colon`: `:1`, `:2`... (Oracle)
/// - `AtP`: `@p1`, `@p2`... (SQL Server)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    #[default]
    Question,
    Dollar,
    Colon,
    AtP,
}

impl PlaceholderPolicy for Placeholder {
    fn placeholder(&self, _: &Value, ordinal: usize) -> String {
        let n = ordinal + 1;
        match self {
            Self::Question => "?".to_string(),
            Self::Dollar => format!("${n}"),
            Self::Colon => format!(":{n}"),
            Self::AtP => format!("@p{n}"),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = match self {
            Self::Question => "?",
            Self::Dollar => "$n",
            Self::Colon => ":n",
            Self::AtP => "@pn",
        };
        f.write_str(style)
    }
}
