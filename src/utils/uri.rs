// ! URI handling utilities
// !
// ! Module provides URI validation for registered resources and the
// ! RFC-6570 level-1 URI-template matcher used for parameterized resources.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use url::Url;

use crate::core::error::{McpError, McpResult};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap());

/// A compiled URI template such as `config://{key}` or `file:///{path}/meta`.
///
/// Each `{var}` placeholder matches one or more non-slash characters; all
/// other characters match literally. Compilation happens once, at
/// registration time.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    template: String,
    pattern: Regex,
    variables: Vec<String>,
}

impl UriTemplate {
    /// Compile a template. Fails when no placeholder is present or a
    /// placeholder name repeats.
    pub fn compile(template: &str) -> McpResult<Self> {
        let mut variables = Vec::new();
        for capture in PLACEHOLDER.captures_iter(template) {
            let name = capture[1].to_string();
            if variables.contains(&name) {
                return Err(McpError::InvalidUri(format!(
                    "duplicate variable '{name}' in template '{template}'"
                )));
            }
            variables.push(name);
        }
        if variables.is_empty() {
            return Err(McpError::InvalidUri(format!(
                "template '{template}' has no {{var}} placeholder"
            )));
        }

        // Escape the literal stretches between placeholders, then splice in
        // one named group per variable. `+` keeps empty segments from
        // matching.
        let mut pattern = String::from("^");
        let mut last = 0;
        for capture in PLACEHOLDER.captures_iter(template) {
            let whole = capture.get(0).expect("capture 0 always present");
            pattern.push_str(&regex::escape(&template[last..whole.start()]));
            pattern.push_str(&format!("(?P<{}>[^/]+)", &capture[1]));
            last = whole.end();
        }
        pattern.push_str(&regex::escape(&template[last..]));
        pattern.push('$');

        let pattern = Regex::new(&pattern)
            .map_err(|e| McpError::InvalidUri(format!("template '{template}': {e}")))?;

        Ok(Self {
            template: template.to_string(),
            pattern,
            variables,
        })
    }

    /// The original template string
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in appearance order
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Match a URI against the template, extracting percent-decoded
    /// variable values. Returns `None` when the URI does not match.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let captures = self.pattern.captures(uri)?;
        let mut values = HashMap::with_capacity(self.variables.len());
        for name in &self.variables {
            let raw = captures.name(name)?.as_str();
            let decoded = percent_decode(raw).unwrap_or_else(|_| raw.to_string());
            values.insert(name.clone(), decoded);
        }
        Some(values)
    }
}

/// Validate a registered resource URI: absolute form with a scheme,
/// parseable by the `url` crate.
pub fn validate_uri(uri: &str) -> McpResult<()> {
    if uri.is_empty() {
        return Err(McpError::InvalidUri("URI cannot be empty".to_string()));
    }
    if !SCHEME.is_match(uri) {
        return Err(McpError::InvalidUri(format!(
            "URI '{uri}' must be absolute (scheme://...)"
        )));
    }
    Url::parse(uri).map_err(|e| McpError::InvalidUri(format!("invalid URI '{uri}': {e}")))?;
    Ok(())
}

/// Validate a URI template's literal shape without compiling it
pub fn validate_uri_template(template: &str) -> McpResult<()> {
    UriTemplate::compile(template).map(|_| ())
}

/// Simple percent decoding for URI components
pub fn percent_decode(s: &str) -> McpResult<String> {
    let mut bytes = Vec::with_capacity(s.len());
    let mut chars = s.bytes();

    while let Some(b) = chars.next() {
        if b == b'%' {
            let hi = chars
                .next()
                .ok_or_else(|| McpError::InvalidUri("incomplete percent encoding".to_string()))?;
            let lo = chars
                .next()
                .ok_or_else(|| McpError::InvalidUri("incomplete percent encoding".to_string()))?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex)
                .map_err(|_| McpError::InvalidUri("invalid percent encoding".to_string()))?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| {
                McpError::InvalidUri(format!("invalid hex in percent encoding: {hex}"))
            })?;
            bytes.push(byte);
        } else {
            bytes.push(b);
        }
    }

    String::from_utf8(bytes)
        .map_err(|_| McpError::InvalidUri("percent-decoded bytes are not UTF-8".to_string()))
}
