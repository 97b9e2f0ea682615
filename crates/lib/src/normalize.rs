//! # Response Normalizer
//!
//! LLM completions that are supposed to be JSON regularly arrive with a handful
//! of recurring defects: a dropped closing brace after a final array, a period
//! or stray quote after the closing brace, or the whole payload wrapped in a
//! Markdown code fence. This module applies a fixed, ordered list of textual
//! repairs before parsing.
//!
//! The repairs are heuristics. A payload that legitimately contains `}.` or `}"`
//! inside a string value will be altered.

use crate::errors::ItemError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// A parsed, repaired LLM response.
pub type NormalizedPayload = Map<String, Value>;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*```(?:json|JSON)?[ \t]*\n?([\s\S]*?)\n?[ \t]*```\s*$")
        .expect("code fence pattern is valid")
});

static DANGLING_ARRAY_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\]\](\s*[."]?\s*)\z"#).expect("array close pattern is valid"));

/// A single named repair step.
#[derive(Debug, Clone, Copy)]
pub struct RepairRule {
    pub name: &'static str,
    apply: fn(&str) -> Option<String>,
}

impl RepairRule {
    /// Applies the rule, returning `None` when it does not match.
    pub fn apply(&self, input: &str) -> Option<String> {
        (self.apply)(input)
    }
}

/// The repair rules, in application order.
pub const REPAIR_RULES: &[RepairRule] = &[
    RepairRule {
        name: "code-fence",
        apply: unwrap_code_fence,
    },
    RepairRule {
        name: "dangling-array-close",
        apply: close_dangling_array,
    },
    RepairRule {
        name: "trailing-period",
        apply: strip_trailing_period,
    },
    RepairRule {
        name: "stray-quote",
        apply: strip_stray_quote,
    },
];

fn unwrap_code_fence(input: &str) -> Option<String> {
    CODE_FENCE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn close_dangling_array(input: &str) -> Option<String> {
    if !DANGLING_ARRAY_CLOSE.is_match(input) {
        return None;
    }
    Some(DANGLING_ARRAY_CLOSE.replace(input, "]}$1").into_owned())
}

fn strip_trailing_period(input: &str) -> Option<String> {
    replace_literal(input, "}.", "}")
}

fn strip_stray_quote(input: &str) -> Option<String> {
    replace_literal(input, "}\"", "}")
}

fn replace_literal(input: &str, from: &str, to: &str) -> Option<String> {
    input.contains(from).then(|| input.replace(from, to))
}

/// The outcome of [`repair`]: the repaired text and the rules that changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    pub text: String,
    pub applied: Vec<&'static str>,
}

/// Applies every rule in [`REPAIR_RULES`] and reports which ones fired.
pub fn repair(raw: &str) -> Repair {
    let mut text = raw.to_string();
    let mut applied = Vec::new();
    for rule in REPAIR_RULES {
        if let Some(repaired) = rule.apply(&text) {
            if repaired != text {
                applied.push(rule.name);
                text = repaired;
            }
        }
    }
    Repair { text, applied }
}

/// Applies the repair rules and returns the repaired text.
pub fn normalize(raw: &str) -> String {
    repair(raw).text
}

/// Parses a normalized response into a JSON object.
pub fn parse(normalized: &str) -> Result<NormalizedPayload, ItemError> {
    let value: Value = serde_json::from_str(normalized).map_err(|e| {
        let (line, column) = (e.line(), e.column());
        ItemError::MalformedResponse {
            line,
            column,
            found: char_at(normalized, line, column),
            message: e.to_string(),
        }
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ItemError::MalformedResponse {
            line: 1,
            column: 1,
            found: normalized.trim_start().chars().next(),
            message: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
    }
}

/// Locates the character serde_json reported an error at (1-based line and column).
fn char_at(text: &str, line: usize, column: usize) -> Option<char> {
    if line == 0 || column == 0 {
        return None;
    }
    let line_text = text.split('\n').nth(line - 1)?;
    line_text
        .get(column - 1..)
        .and_then(|rest| rest.chars().next())
        .or_else(|| line_text.chars().last())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_at_reports_the_column_character() {
        assert_eq!(char_at("{\"a\": x}", 1, 7), Some('x'));
        assert_eq!(char_at("{\n  \"a\": ?\n}", 2, 8), Some('?'));
        assert_eq!(char_at("abc", 0, 1), None);
    }

    #[test]
    fn char_at_falls_back_to_the_last_character_past_the_end() {
        assert_eq!(char_at("{\"a\": 1", 1, 8), Some('1'));
    }
}
