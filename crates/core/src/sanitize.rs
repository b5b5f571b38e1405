//! Rendering and HTML-escaping of captured output.
//!
//! Everything shown in the learner's console passes through
//! [`escape_html`] exactly once, at the point an output channel hands a
//! fragment to its subscriber.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Escape the five HTML-special characters `& < > " '`.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// An arbitrary value captured from sandboxed execution.
///
/// A `console.log("a", 1)` call arrives as the array `["a", 1]` and is
/// rendered as `a,1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogFragment(pub Value);

impl LogFragment {
    /// Plain-text rendering, not yet escaped.
    pub fn render(&self) -> String {
        match &self.0 {
            Value::Array(items) => items
                .iter()
                .map(render_item)
                .collect::<Vec<_>>()
                .join(","),
            other => render_item(other),
        }
    }

    /// Rendering escaped for display.
    pub fn sanitized(&self) -> String {
        escape_html(&self.render())
    }
}

fn render_item(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<&str> for LogFragment {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<String> for LogFragment {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<Value> for LogFragment {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_all_special_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(escape_html("hello world"), "hello world");
    }

    #[test]
    fn array_fragments_join_with_commas() {
        let fragment = LogFragment(serde_json::json!(["a", 1, true, null]));
        assert_eq!(fragment.render(), "a,1,true,");
    }

    #[test]
    fn sanitized_escapes_rendered_text() {
        let fragment = LogFragment::from("<b>");
        assert_eq!(fragment.sanitized(), "&lt;b&gt;");
    }

    #[test]
    fn objects_render_as_json() {
        let fragment = LogFragment(serde_json::json!({"k": 1}));
        assert_eq!(fragment.render(), r#"{"k":1}"#);
    }
}
