//! Plugin and theme metadata
//!
//! Both file kinds may start with a comment header of `@tag value` lines:
//!
//! ```text
//! -- @name Hello
//! -- @version 1.0.0
//! ```
//!
//! Plugins can also declare a `meta` table, which takes precedence field by
//! field. Anything still missing falls back to defaults, and the name to the
//! file name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static HEADER_TAG: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"@(name|version|description|author)[ \t]+([^\r\n]+)"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
}

/// Header fields as found; absent tags stay `None`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
}

impl HeaderFields {
    /// Fill fields missing from `self` with those of `fallback`
    pub fn or(self, fallback: HeaderFields) -> HeaderFields {
        HeaderFields {
            name: self.name.or(fallback.name),
            version: self.version.or(fallback.version),
            description: self.description.or(fallback.description),
            author: self.author.or(fallback.author),
        }
    }

    pub fn into_metadata(self, file_name: &str) -> Metadata {
        Metadata {
            name: self.name.unwrap_or_else(|| file_name.to_string()),
            version: self.version.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
        }
    }
}

/// Extract `@tag value` pairs; the first occurrence of each tag wins
pub fn parse_header(source: &str) -> HeaderFields {
    let mut fields = HeaderFields::default();
    let Ok(re) = HEADER_TAG.as_ref() else {
        return fields;
    };

    for caps in re.captures_iter(source) {
        let value = clean_value(&caps[2]);
        if value.is_empty() {
            continue;
        }
        let slot = match &caps[1] {
            "name" => &mut fields.name,
            "version" => &mut fields.version,
            "description" => &mut fields.description,
            _ => &mut fields.author,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    fields
}

/// Trim whitespace and a trailing block-comment terminator
fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_suffix("*/")
        .unwrap_or(trimmed)
        .trim_end()
        .to_string()
}
