#![allow(dead_code)]

use std::path::PathBuf;

use sql_bind_template::{Directory, EngineBuilder, TemplateEngine};

pub fn queries(namespace: &str) -> Directory {
    Directory::new(
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("queries")
            .join(namespace),
    )
}

pub fn users_engine(builder: EngineBuilder) -> TemplateEngine {
    let engine = builder.build();
    engine
        .register("users", &queries("users"), ".tsql")
        .expect("users queries register");
    engine
}
