//! In-process tag decoding and deduplication.
//!
//! Mirrors the `ov_unistr` update expression so a tag list can be previewed
//! without a database. Decoding follows Python's `unicode_escape` codec
//! applied to a latin-1 `backslashreplace` encoding of the name, which is
//! exactly what the installed function runs.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{MaintenanceError, Result};

// Keep in sync with the jsonpath predicate in `decode_image_tags`.
static RAW_ESCAPED_UNICODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\\(x)([\da-f]{2})|\\(u)([\da-f]{4})").expect("escape pattern compiles")
});

/// A media tag as stored in the catalog's `tags` JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw provider value. `None` means the key is absent, which is distinct
    /// from an explicit JSON `null`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub provider: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Any other keys, preserved as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tag {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            provider: Some(Value::String(provider.into())),
            accuracy: None,
            extra: Map::new(),
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Whether a tag name contains a `\xHH` or `\uHHHH` sequence.
pub fn needs_decoding(name: &str) -> bool {
    RAW_ESCAPED_UNICODE.is_match(name)
}

/// Decode escape sequences in `s`.
///
/// Handles `\xHH`, `\uHHHH`, `\UHHHHHHHH`, octal escapes and the single
/// character escapes (`\n`, `\\`, ...). Unknown escapes are kept verbatim.
/// Truncated sequences, surrogates and `\N{...}` are errors.
pub fn decode_unicode_escapes(s: &str) -> Result<String> {
    let encoded = backslash_replace(s);
    let chars: Vec<char> = encoded.chars().collect();
    let fail = |reason: &str| MaintenanceError::TagDecode {
        name: s.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(&next) = chars.get(i) else {
            return Err(fail("\\ at end of string"));
        };
        i += 1;
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => {
                let mut code = next.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.get(i).and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            i += 1;
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or_else(|| fail("invalid octal escape"))?);
            }
            'x' | 'u' | 'U' => {
                let (width, label) = match next {
                    'x' => (2, "truncated \\xXX escape"),
                    'u' => (4, "truncated \\uXXXX escape"),
                    _ => (8, "truncated \\UXXXXXXXX escape"),
                };
                let digits = chars.get(i..i + width).ok_or_else(|| fail(label))?;
                let code = digits
                    .iter()
                    .try_fold(0u32, |acc, c| c.to_digit(16).map(|d| acc * 16 + d))
                    .ok_or_else(|| fail(label))?;
                i += width;
                let decoded = char::from_u32(code)
                    .ok_or_else(|| fail("escape is not a valid unicode scalar value"))?;
                out.push(decoded);
            }
            'N' => return Err(fail("named unicode escapes are not supported")),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// Latin-1 `backslashreplace` encoding, kept as text: characters above
/// U+00FF become `\uXXXX` or `\UXXXXXXXX`.
fn backslash_replace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match u32::from(c) {
            0..=0xFF => out.push(c),
            code @ 0x100..=0xFFFF => out.push_str(&format!("\\u{code:04x}")),
            code => out.push_str(&format!("\\U{code:08x}")),
        }
    }
    out
}

/// Decode every tag name and drop duplicates by `(name, provider)`,
/// keeping the first occurrence. Nameless tags pass through undecoded.
///
/// Providers compare as JSON values, like `tag->'provider'` in the update:
/// an absent provider and a `null` one are different keys.
pub fn decode_and_deduplicate(tags: &[Tag]) -> Result<Vec<Tag>> {
    let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::new();
    let mut result = Vec::with_capacity(tags.len());

    for tag in tags {
        let fixed = tag.name.as_deref().map(decode_unicode_escapes).transpose()?;
        let provider = tag.provider.as_ref().map(Value::to_string);
        if seen.insert((fixed.clone(), provider)) {
            result.push(Tag {
                name: fixed,
                ..tag.clone()
            });
        }
    }
    Ok(result)
}

/// Before/after view of one tag list.
#[derive(Debug, Clone, Serialize)]
pub struct TagPreview {
    /// Whether the row would be selected for update.
    pub selected: bool,
    pub before: Vec<Tag>,
    pub after: Vec<Tag>,
    pub decoded: usize,
    pub removed: usize,
}

/// Preview the update for one row's tags. Unselected rows are unchanged.
pub fn preview(tags: Vec<Tag>) -> Result<TagPreview> {
    let selected = tags
        .iter()
        .any(|t| t.name.as_deref().is_some_and(needs_decoding));
    if !selected {
        return Ok(TagPreview {
            selected,
            after: tags.clone(),
            before: tags,
            decoded: 0,
            removed: 0,
        });
    }

    let after = decode_and_deduplicate(&tags)?;
    let decoded = tags
        .iter()
        .filter(|t| t.name.as_deref().is_some_and(needs_decoding))
        .count();
    let removed = tags.len() - after.len();
    Ok(TagPreview {
        selected,
        before: tags,
        after,
        decoded,
        removed,
    })
}
