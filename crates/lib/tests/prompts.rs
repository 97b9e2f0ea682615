//! # Prompt Template Tests
//!
//! This test suite validates placeholder substitution in `seogen::prompts` and
//! loading templates from disk.

use seogen::errors::{BatchError, TemplateError};
use seogen::prompts::{render, PromptTemplates};
use seogen::types::Item;
use std::collections::HashMap;
use tempfile::tempdir;

// --- Tests for `render` ---

/// Verifies the composed prompt for a Paris option.
#[test]
fn test_render_item_prompt() {
    let item = Item::new("1", "Le Petit Bistro", "Paris", "France");
    let prompt = render(
        "Tell me about {option} in {city}, {country}",
        &item.template_values(),
    )
    .unwrap();
    assert_eq!(prompt, "Tell me about Le Petit Bistro in Paris, France");
}

/// Verifies that a placeholder without a value is reported by name.
#[test]
fn test_render_missing_placeholder() {
    let item = Item::new("1", "Le Petit Bistro", "Paris", "France");
    let err = render("Rewrite {text} for {city}", &item.template_values()).unwrap_err();
    assert_eq!(err, TemplateError::MissingPlaceholder("text".to_string()));
}

/// Verifies that the source text becomes available once an item carries one.
#[test]
fn test_render_with_source_text() {
    let item = Item::new("2", "Louvre", "Paris", "France").with_source_text("A museum.");
    let prompt = render("Rewrite: {text}", &item.template_values()).unwrap();
    assert_eq!(prompt, "Rewrite: A museum.");
}

/// Verifies that doubled braces render literally, so templates can describe JSON.
#[test]
fn test_render_escaped_braces() {
    let values = HashMap::from([("city", "Rome".to_string())]);
    let prompt = render(r#"Answer as {{"title": "..."}} about {city}"#, &values).unwrap();
    assert_eq!(prompt, r#"Answer as {"title": "..."} about Rome"#);
}

/// Verifies that values not named by the template are ignored.
#[test]
fn test_render_ignores_extra_values() {
    let values = HashMap::from([
        ("city", "Rome".to_string()),
        ("country", "Italy".to_string()),
    ]);
    assert_eq!(render("{city}", &values).unwrap(), "Rome");
}

// --- Tests for `PromptTemplates` ---

/// Verifies that templates load from a JSON file and unknown names are rejected.
#[test]
fn test_templates_from_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cheap_eats.json");
    std::fs::write(
        &path,
        r#"{"content": "Describe {option} in {city}", "options": "List places in {city}"}"#,
    )
    .unwrap();

    let templates = PromptTemplates::from_path(&path).unwrap();
    let values = HashMap::from([
        ("city", "Oslo".to_string()),
        ("option", "Mathallen".to_string()),
    ]);

    assert!(templates.contains("options"));
    assert_eq!(
        templates.render("content", &values).unwrap(),
        "Describe Mathallen in Oslo"
    );
    assert_eq!(
        templates.render("images", &values).unwrap_err(),
        TemplateError::UnknownTemplate("images".to_string())
    );
}

/// Verifies that a missing template file is an I/O error naming the path.
#[test]
fn test_templates_missing_file() {
    let dir = tempdir().unwrap();
    let err = PromptTemplates::from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, BatchError::Io { .. }), "unexpected error: {err:?}");
}
