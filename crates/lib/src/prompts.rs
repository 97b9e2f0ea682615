//! # Prompt Templates
//!
//! Prompt templates are loaded once per batch from a JSON document mapping
//! template names to strings with `{placeholder}` slots, for example:
//!
//! ```json
//! { "content": "Describe {option} in {city}, {country}. Answer as JSON {{\"meta\": ...}}" }
//! ```
//!
//! `{{` and `}}` render as literal braces, which lets a template spell out the
//! JSON shape it expects back.

use crate::errors::{BatchError, TemplateError};
use std::collections::HashMap;
use std::path::Path;

/// The system prompt sent alongside every content prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an SEO copywriter for a travel website. Answer only with a single valid JSON object and no surrounding text.";

/// The template used to compose an item's content prompt.
pub const CONTENT_TEMPLATE: &str = "content";
/// The template used to compose an item's illustration prompt.
pub const IMAGE_TEMPLATE: &str = "images";
/// The template used to ask for a city's option list.
pub const OPTIONS_TEMPLATE: &str = "options";
/// The template used to compose a city-level prompt (descriptions, transport).
pub const CITY_TEMPLATE: &str = "city";

/// A read-only set of named prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    templates: HashMap<String, String>,
}

impl PromptTemplates {
    /// Loads templates from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BatchError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| BatchError::io(path, e))?;
        let templates: HashMap<String, String> =
            serde_json::from_str(&content).map_err(|e| BatchError::json(path, e))?;
        Ok(Self { templates })
    }

    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn get(&self, name: &str) -> Result<&str, TemplateError> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Renders the named template with the supplied values.
    pub fn render(
        &self,
        name: &str,
        values: &HashMap<&str, String>,
    ) -> Result<String, TemplateError> {
        render(self.get(name)?, values)
    }
}

/// Fills every `{name}` slot in `template` from `values`.
///
/// Fails with [`TemplateError::MissingPlaceholder`] when the template names a
/// slot that has no value, and with [`TemplateError::Unbalanced`] on a lone
/// brace. Extra values are ignored.
pub fn render(template: &str, values: &HashMap<&str, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template.char_indices().peekable();

    while let Some((pos, c)) = rest.next() {
        match c {
            '{' if matches!(rest.peek(), Some((_, '{'))) => {
                rest.next();
                out.push('{');
            }
            '}' if matches!(rest.peek(), Some((_, '}'))) => {
                rest.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, n) in rest.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    if n == '{' {
                        return Err(TemplateError::Unbalanced(pos));
                    }
                    name.push(n);
                }
                if !closed {
                    return Err(TemplateError::Unbalanced(pos));
                }
                let value = values
                    .get(name.trim())
                    .ok_or_else(|| TemplateError::MissingPlaceholder(name.trim().to_string()))?;
                out.push_str(value);
            }
            '}' => return Err(TemplateError::Unbalanced(pos)),
            other => out.push(other),
        }
    }

    Ok(out)
}
