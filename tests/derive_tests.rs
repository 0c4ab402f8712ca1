mod common;

use serde::Serialize;
use sql_bind_template::{Error, Placeholder, SqlTemplate, TemplateEngine, Value};

use common::users_engine;

#[derive(Serialize, SqlTemplate)]
#[sql(namespace = "users", template = "findById")]
#[allow(non_snake_case)]
struct FindById<'a> {
    Id: &'a str,
    Order: &'a str,
}

#[derive(Serialize, SqlTemplate)]
#[sql(namespace = "users")]
#[allow(non_camel_case_types)]
struct multipleBinds {
    a: i64,
    b: i64,
    c: i64,
}

#[derive(Serialize, SqlTemplate)]
#[sql(namespace = "missing", template = "anything")]
struct Unregistered {
    id: i64,
}

#[test]
fn derived_constants() {
    assert_eq!(FindById::NAMESPACE, "users");
    assert_eq!(FindById::TEMPLATE, "findById");
    assert_eq!(multipleBinds::TEMPLATE, "multipleBinds");
}

#[test]
fn derived_render() {
    let engine = users_engine(TemplateEngine::builder().placeholder(Placeholder::Dollar));

    let result = FindById {
        Id: "1",
        Order: "id",
    }
    .render(&engine)
    .unwrap();

    assert_eq!(result.sql(), "SELECT * FROM users WHERE id=$1 ORDER BY id");
    assert_eq!(result.values().cloned().collect::<Vec<_>>(), [Value::from("1")]);
}

#[test]
fn template_defaults_to_type_name() {
    let engine = users_engine(TemplateEngine::builder());

    let result = multipleBinds { a: 1, b: 2, c: 3 }.render(&engine).unwrap();

    assert_eq!(result.sql(), "a=? AND b=? AND c=?");
    assert_eq!(result.values().len(), 3);
}

#[test]
fn derived_render_reports_unknown_namespace() {
    let engine = TemplateEngine::new();

    let err = Unregistered { id: 1 }.render(&engine).unwrap_err();

    assert!(matches!(err, Error::UnknownNamespace(ns) if ns == "missing"));
}
