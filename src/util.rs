// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Small helpers shared across the framework.

use ring::rand::{SecureRandom, SystemRandom};
use std::path::Path;

const LOWER_AND_DIGITS: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SPECIAL: &str = "!@#$%^&*()}{[]?\\/.,";

/// Whether a file name only contains characters we are willing to turn into
/// a path: ASCII letters, digits and `/ \ _ . : -`.
pub fn is_secure(name: &str) -> bool {
    name.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '/' | '\\' | '_' | '.' | ':' | '-')
    })
}

/// Same check as [`is_secure`] for a path.
pub fn is_secure_path(path: &Path) -> bool {
    path.to_str().map(is_secure).unwrap_or(false)
}

/// Generate a random string from the system RNG.
///
/// The alphabet is lowercase letters and digits, extended with uppercase
/// letters when `case_sensitive` is set and punctuation when `special` is set.
pub fn random_string(length: usize, special: bool, case_sensitive: bool) -> anyhow::Result<String> {
    let mut alphabet = String::from(LOWER_AND_DIGITS);
    if case_sensitive {
        alphabet.push_str(UPPER);
    }
    if special {
        alphabet.push_str(SPECIAL);
    }
    let alphabet: Vec<char> = alphabet.chars().collect();

    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("System RNG failure"))?;

    Ok(bytes
        .iter()
        .map(|b| alphabet[*b as usize % alphabet.len()])
        .collect())
}

/// Create a directory and any missing parents. Succeeds if it already exists.
pub fn create_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
}

/// Escape text for inclusion in HTML.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render a value as an HTML debug block with a heading.
///
/// Objects and arrays become nested lists; scalars become a paragraph.
pub fn debug_html(heading: &str, value: &serde_json::Value) -> String {
    let mut out = format!("<div class=\"echo\"><h1>{}</h1>", html_escape(heading));
    match value {
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => debug_list(value, &mut out),
        other => {
            out.push_str("<p>");
            out.push_str(&html_escape(&scalar_text(other)));
            out.push_str("</p>");
        }
    }
    out.push_str("</div>");
    out
}

fn debug_list(value: &serde_json::Value, out: &mut String) {
    let entries: Vec<(String, &serde_json::Value)> = match value {
        serde_json::Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => return,
    };
    if entries.is_empty() {
        return;
    }
    out.push_str("<ul>");
    for (key, item) in entries {
        out.push_str("<li>");
        out.push_str(&html_escape(&key));
        out.push_str(" =&gt; ");
        if item.is_object() || item.is_array() {
            debug_list(item, out);
        } else {
            out.push_str(&html_escape(&scalar_text(item)));
        }
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

/// Text form of a scalar JSON value (strings unquoted, null empty).
pub fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_secure() {
        assert!(is_secure("application/pc/views/index/index.html"));
        assert!(is_secure("C:\\app\\file-name_1.env"));
        assert!(!is_secure("index.html?x=1"));
        assert!(!is_secure("views/<script>"));
        assert!(!is_secure("with space"));
    }

    #[test]
    fn test_random_string_alphabet() {
        let s = random_string(64, false, false).unwrap();
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| LOWER_AND_DIGITS.contains(c)));

        let s = random_string(200, true, true).unwrap();
        assert_eq!(s.chars().count(), 200);
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#039;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_debug_html_nested() {
        let html = debug_html("Trace", &json!({"a": 1, "b": ["x", "<y>"]}));
        assert!(html.starts_with("<div class=\"echo\"><h1>Trace</h1><ul>"));
        assert!(html.contains("<li>a =&gt; 1</li>"));
        assert!(html.contains("<li>1 =&gt; &lt;y&gt;</li>"));
    }

    #[test]
    fn test_create_dir_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        create_dir(&nested).unwrap();
        assert!(nested.is_dir());
        create_dir(&nested).unwrap();
    }
}
