use minijinja::value::{Value, ValueKind};
use sqlx::{Arguments, Database, Encode, error::BoxDynError, prelude::Type};

use crate::{Error, RenderResult, Result};

impl RenderResult {
    /// Encodes the bound values into `DB` query arguments.
    ///
    /// Supported value kinds are none/undefined (encoded as a `NULL` text),
    /// booleans, integers within `i64`, floats, strings and bytes.
    ///
    /// # Errors
    /// [`Error::Encode`] naming the ordinal of the first value that is a
    /// sequence, a map or an object, an integer outside `i64`, or that `DB`
    /// refuses to encode.
    ///
    /// # Example
    /// ```ignore
    /// let (sql, arguments) = result.into_arguments::<sqlx::Postgres>()?;
    /// let rows = sqlx::query_with(&sql, arguments).fetch_all(&pool).await?;
    /// ```
    pub fn into_arguments<'q, DB>(self) -> Result<(String, DB::Arguments<'q>)>
    where
        DB: Database,
        bool: Encode<'q, DB> + Type<DB>,
        i64: Encode<'q, DB> + Type<DB>,
        f64: Encode<'q, DB> + Type<DB>,
        String: Encode<'q, DB> + Type<DB>,
        Vec<u8>: Encode<'q, DB> + Type<DB>,
        Option<String>: Encode<'q, DB> + Type<DB>,
    {
        let (sql, values) = self.into_parts();
        let mut arguments: DB::Arguments<'q> = Default::default();
        for (ordinal, value) in values.into_iter().enumerate() {
            encode_value::<DB>(&mut arguments, value)
                .map_err(|source| Error::Encode { ordinal, source })?;
        }
        Ok((sql, arguments))
    }
}

fn encode_value<'q, DB>(arguments: &mut DB::Arguments<'q>, value: Value) -> Result<(), BoxDynError>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Vec<u8>: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
{
    match value.kind() {
        ValueKind::Undefined | ValueKind::None => arguments.add(None::<String>),
        ValueKind::Bool => arguments.add(value.is_true()),
        ValueKind::Number if value.is_integer() => match i64::try_from(value.clone()) {
            Ok(int) => arguments.add(int),
            Err(_) => Err(format!("integer {value} does not fit in i64").into()),
        },
        ValueKind::Number => arguments.add(f64::try_from(value)?),
        ValueKind::String => arguments.add(value.as_str().unwrap_or_default().to_string()),
        ValueKind::Bytes => arguments.add(value.as_bytes().unwrap_or_default().to_vec()),
        kind => Err(format!("cannot bind a value of kind {kind:?}").into()),
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use sqlx::{Arguments, Sqlite};

    use crate::{Embedded, Error, TemplateEngine, Value};

    fn engine() -> TemplateEngine {
        let engine = TemplateEngine::new();
        engine
            .register(
                "t",
                &Embedded::new([
                    (
                        "scalars.tsql",
                        "{{ bind(none) }} {{ bind(true) }} {{ bind(3) }} {{ bind(1.5) }} {{ bind('s') }}",
                    ),
                    ("seq.tsql", "{{ bind(1) }} {{ bind([1, 2]) }}"),
                    ("one.tsql", "{{ bind(n) }}"),
                ]),
                "tsql",
            )
            .unwrap();
        engine
    }

    #[test]
    fn scalars_encode() {
        let result = engine().render("t", "scalars").unwrap();
        let (sql, arguments) = result.into_arguments::<Sqlite>().unwrap();
        assert_eq!(sql, "? ? ? ? ?");
        assert_eq!(arguments.len(), 5);
    }

    #[test]
    fn sequences_are_rejected_with_their_ordinal() {
        let result = engine().render("t", "seq").unwrap();
        let err = result.into_arguments::<Sqlite>().unwrap_err();
        assert!(matches!(err, Error::Encode { ordinal: 1, .. }));
    }

    #[test]
    fn integers_outside_i64_are_rejected() {
        for n in [Value::from(u64::MAX), Value::from(i128::MIN)] {
            let result = engine().render_with_map("t", "one", [("n", n)]).unwrap();
            let err = result.into_arguments::<Sqlite>().unwrap_err();
            assert!(matches!(err, Error::Encode { ordinal: 0, .. }));
        }
    }

    #[test]
    fn in_range_numbers_encode() {
        let numbers = [
            Value::from(i64::MIN),
            Value::from(u64::from(u32::MAX)),
            Value::from(0.25),
        ];
        for n in numbers {
            let result = engine().render_with_map("t", "one", [("n", n)]).unwrap();
            let (_, arguments) = result.into_arguments::<Sqlite>().unwrap();
            assert_eq!(arguments.len(), 1);
        }
    }
}
