use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

/// Derive macro tying a record type to a namespaced SQL template.
///
/// # Attributes
///
/// ## `#[sql(...)]` (Required)
/// - `namespace`: namespace the template was registered under
/// - `template`: template name inside the namespace; defaults to the type name
///
/// # Example
/// ```ignore
/// #[derive(Serialize, SqlTemplate)]
/// #[sql(namespace = "users", template = "findByName")]
/// struct FindByName {
///     name: String,
///     order: String,
/// }
///
/// let result = FindByName { name: "Bill".into(), order: "id".into() }.render(&engine)?;
/// ```
///
/// # Generated Implementation
/// Implements `sql_bind_template::SqlTemplate`, whose `render(&engine)`
/// renders the template with the value's serialized fields as data. The type
/// must also implement `serde::Serialize`.
#[proc_macro_derive(SqlTemplate, attributes(sql))]
pub fn sql_template(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let mut namespace: Option<LitStr> = None;
    let mut template: Option<LitStr> = None;

    for attr in input.attrs.iter().filter(|a| a.path().is_ident("sql")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("namespace") {
                namespace = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("template") {
                template = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `namespace` or `template`"))
            }
        })?;
    }

    let namespace = namespace.ok_or_else(|| {
        syn::Error::new_spanned(
            name,
            "missing `#[sql(namespace = \"...\")]` on SqlTemplate derive",
        )
    })?;
    let template = template.unwrap_or_else(|| LitStr::new(&name.to_string(), name.span()));

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::sql_bind_template::SqlTemplate for #name #ty_generics
            #where_clause
        {
            const NAMESPACE: &'static str = #namespace;
            const TEMPLATE: &'static str = #template;
        }
    })
}
