//! Flat VDF (Valve Data Format) key/value reading
//!
//! Steam's `.acf` and `.vdf` files are nested `"key" "value"` documents. The
//! monitor only needs the flat pairs, so section headers and braces are ignored
//! and every `"key" "value"` line is collected regardless of depth.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

fn key_value_re() -> &'static Regex {
    static KV_RE: OnceLock<Regex> = OnceLock::new();
    KV_RE.get_or_init(|| Regex::new(r#"^\s*"([^"]+)"\s+"([^"]*)"\s*$"#).unwrap())
}

/// Parses `"key" "value"` lines into a map
///
/// Lines that are not a single quoted pair are skipped. When a key repeats,
/// the last occurrence wins.
pub fn parse_key_values(text: &str) -> HashMap<String, String> {
    let kv = key_value_re();
    let mut result = HashMap::new();

    for line in text.lines() {
        if let Some(caps) = kv.captures(line) {
            if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
                result.insert(key.as_str().to_string(), value.as_str().to_string());
            }
        }
    }

    result
}

/// VDF builder used by tests to write manifest and library fixtures in the
/// same layout Steam produces
#[cfg(test)]
pub(crate) struct VdfBuilder {
    content: String,
    indent_level: usize,
}

#[cfg(test)]
impl VdfBuilder {
    pub(crate) fn new() -> Self {
        Self {
            content: String::new(),
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.indent_level {
            self.content.push('\t');
        }
    }

    /// Writes a key-value pair: "key"		"value"
    pub(crate) fn key_value(&mut self, key: &str, value: &str) -> &mut Self {
        self.indent();
        self.content.push_str(&format!("\"{}\"\t\t\"{}\"\n", key, value));
        self
    }

    /// Opens a new section: "name"\n{\n
    pub(crate) fn open_section(&mut self, name: &str) -> &mut Self {
        self.indent();
        self.content.push_str(&format!("\"{}\"\n", name));
        self.indent();
        self.content.push_str("{\n");
        self.indent_level += 1;
        self
    }

    pub(crate) fn close_section(&mut self) -> &mut Self {
        self.indent_level = self.indent_level.saturating_sub(1);
        self.indent();
        self.content.push_str("}\n");
        self
    }

    pub(crate) fn build(&self) -> String {
        self.content.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_pairs() {
        let text = "\"appid\" \"123\"\n\"name\" \"Test Game\"\n";
        let parsed = parse_key_values(text);
        assert_eq!(parsed.get("appid").map(String::as_str), Some("123"));
        assert_eq!(parsed.get("name").map(String::as_str), Some("Test Game"));
    }

    #[test]
    fn test_parse_ignores_sections_and_reads_nested_pairs() {
        let text = VdfBuilder::new()
            .open_section("AppState")
            .key_value("appid", "47410")
            .open_section("UserConfig")
            .key_value("language", "english")
            .close_section()
            .close_section()
            .build();

        let parsed = parse_key_values(&text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("appid").map(String::as_str), Some("47410"));
        assert_eq!(parsed.get("language").map(String::as_str), Some("english"));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let text = "\"appid\" 123\n\"name\"\ngarbage\n\"ok\" \"\"\n\"a\" \"b\" \"c\"\n";
        let parsed = parse_key_values(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("ok").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_last_duplicate_wins() {
        let parsed = parse_key_values("\"name\" \"First\"\n\"name\" \"Second\"\n");
        assert_eq!(parsed.get("name").map(String::as_str), Some("Second"));
    }
}
