/*
 * repository_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Integration tests for template repositories using test fixtures.
 */

use pretty_assertions::assert_eq;
use quarto_mustache::{
    DirectorySource, MustacheError, ParseError, Template, TemplateRepository, Value,
};
use std::path::{Path, PathBuf};

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

fn fixtures() -> TemplateRepository {
    TemplateRepository::from_directory(fixture_path(""))
}

fn page_data() -> Value {
    Value::from(serde_json::json!({
        "title": "Notes",
        "site": "Quarto",
        "paragraphs": ["a<b", "c"],
    }))
}

#[test]
fn test_inherited_layout_from_directory() {
    let template = fixtures().template("page").unwrap();
    insta::assert_snapshot!(
        template.render(&page_data()).unwrap(),
        @"<html><head><title>Notes</title></head><body><article><p>a&lt;b</p><p>c</p></article><footer>Quarto</footer></body></html>"
    );
}

#[test]
fn test_partial_names_resolve_from_the_referencing_template() {
    let repository = fixtures();
    // The footer is referenced from layouts/base with a leading slash
    let template = repository.template("layouts/base").unwrap();
    assert_eq!(
        template.render(&Value::map([("site", "Q")])).unwrap(),
        "<html><head><title>Untitled</title></head><body><footer>Q</footer></body></html>"
    );

    let template = repository.template_from_string("{{>partials/footer}}").unwrap();
    assert_eq!(template.render(&Value::map([("site", "Q")])).unwrap(), "<footer>Q</footer>");
}

#[test]
fn test_compile_from_file() {
    let template = Template::compile_from_file(fixture_path("letter.txt")).unwrap();
    let data = Value::map([
        ("name", Value::from("Ann & Bob")),
        ("items", Value::list(["milk", "eggs"])),
    ]);
    assert_eq!(
        template.render(&data).unwrap(),
        "Dear Ann & Bob,\n1. milk\n2. eggs\n"
    );
}

#[test]
fn test_compile_from_missing_file() {
    let error = Template::compile_from_file(fixture_path("missing.mustache")).unwrap_err();
    assert!(matches!(error, MustacheError::TemplateNotFound { .. }));
}

#[test]
fn test_missing_partial_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.mustache"), "a\n{{> nowhere }}").unwrap();

    let repository = TemplateRepository::from_directory(dir.path());
    let error = repository.template("main").unwrap_err();
    let MustacheError::Parse(ParseError::MissingPartial { name, location }) = error else {
        panic!("expected a missing partial error, got {error:?}");
    };
    assert_eq!(name, "nowhere");
    assert_eq!(location.line, 2);
    assert_eq!(location.template_id.as_deref(), Some("main.mustache"));
}

#[test]
fn test_names_cannot_leave_the_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("templates");
    std::fs::create_dir(&root).unwrap();
    std::fs::write(dir.path().join("secret.mustache"), "secret").unwrap();
    std::fs::write(root.join("main.mustache"), "{{>../secret}}").unwrap();

    let repository = TemplateRepository::from_directory(&root);
    assert!(matches!(
        repository.template("main"),
        Err(MustacheError::Parse(ParseError::MissingPartial { .. }))
    ));
}

#[test]
fn test_custom_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.html"), "<p>{{>part}}</p>").unwrap();
    std::fs::write(dir.path().join("part.html"), "{{x}}").unwrap();

    let repository =
        TemplateRepository::new(DirectorySource::new(dir.path()).with_extension("html"));
    let template = repository.template("main").unwrap();
    assert_eq!(template.render(&Value::map([("x", "&")])).unwrap(), "<p>&amp;</p>");
}

#[test]
fn test_templates_are_cached_until_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeting.mustache");
    std::fs::write(&path, "Hello").unwrap();

    let repository = TemplateRepository::from_directory(dir.path());
    let data = Value::Null;
    assert_eq!(repository.template("greeting").unwrap().render(&data).unwrap(), "Hello");

    std::fs::write(&path, "Bonjour").unwrap();
    assert_eq!(repository.template("greeting").unwrap().render(&data).unwrap(), "Hello");

    repository.reload_templates();
    assert_eq!(repository.template("greeting").unwrap().render(&data).unwrap(), "Bonjour");
}

#[test]
fn test_failed_compile_can_be_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.mustache");
    std::fs::write(&path, "{{#open}}").unwrap();

    let repository = TemplateRepository::from_directory(dir.path());
    assert!(repository.template("main").is_err());

    std::fs::write(&path, "{{#open}}fixed{{/open}}").unwrap();
    let template = repository.template("main").unwrap();
    assert_eq!(template.render(&Value::map([("open", true)])).unwrap(), "fixed");
}

#[test]
fn test_recursive_partials_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("tree.mustache"),
        "{{name}}{{#children}}({{>tree}}){{/children}}",
    )
    .unwrap();

    let repository = TemplateRepository::from_directory(dir.path());
    let data = Value::from(serde_json::json!({
        "name": "a",
        "children": [
            { "name": "b", "children": [] },
            { "name": "c", "children": [{ "name": "d", "children": [] }] },
        ],
    }));
    let template = repository.template("tree").unwrap();
    assert_eq!(template.render(&data).unwrap(), "a(b)(c(d))");
}

#[test]
fn test_concurrent_compilation_and_rendering() {
    let repository = fixtures();
    let data = page_data();
    let expected = repository.template("page").unwrap().render(&data).unwrap();
    repository.reload_templates();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repository = &repository;
                let data = &data;
                scope.spawn(move || repository.template("page").unwrap().render(data).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
