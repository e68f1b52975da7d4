use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Values available to non-counter tokens at format time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenContext<'a> {
    pub job_number: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub suffix: Option<&'a str>,
}

/// Fallback pattern for entity types with no built-in default.
pub const GENERIC_DEFAULT_PATTERN: &str = "{YYYY}-{###}";

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("job", "JOB-{YYYY}-{###}"),
    ("estimate", "EST-{YYYY}-{###}"),
    ("proposal", "PRP-{YYYY}-{###}"),
    ("invoice", "INV-{YYYY}-{###}"),
    ("purchase_order", "PO-{YYYY}-{###}"),
    ("change_order", "CO-{###}"),
    ("work_order", "WO-{YYYY}-{###}"),
];

/// Built-in pattern for an entity type, used when the company has not
/// configured one.
pub fn default_pattern(entity_type: &str) -> &'static str {
    DEFAULT_PATTERNS
        .iter()
        .find(|(known, _)| *known == entity_type)
        .map(|(_, pattern)| *pattern)
        .unwrap_or(GENERIC_DEFAULT_PATTERN)
}

pub fn default_patterns() -> BTreeMap<&'static str, &'static str> {
    DEFAULT_PATTERNS.iter().copied().collect()
}

/// Substitute tokens into a pattern.
///
/// Counter tokens pad to their width but never truncate: a counter wider
/// than the pad prints in full. Unrecognized tokens pass through unchanged;
/// pattern validation is a separate step, never an allocation-time gate. A
/// `{JOB}` token with no job in context substitutes empty and warns.
pub fn format_pattern(
    pattern: &str,
    counter: i64,
    at: DateTime<Utc>,
    ctx: &TokenContext<'_>,
) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after_open = &rest[open..];
        let Some(close) = after_open.find('}') else {
            // Unbalanced brace: emit the remainder literally.
            out.push_str(after_open);
            return out;
        };
        let token = &after_open[1..close];
        match token {
            "YYYY" => out.push_str(&format!("{:04}", at.year())),
            "YY" => out.push_str(&format!("{:02}", at.year().rem_euclid(100))),
            "MM" => out.push_str(&format!("{:02}", at.month())),
            "###" => out.push_str(&format!("{:03}", counter)),
            "##" => out.push_str(&format!("{:02}", counter)),
            "#" => out.push_str(&counter.to_string()),
            "JOB" => match ctx.job_number {
                Some(job_number) => out.push_str(job_number),
                None => {
                    tracing::warn!(pattern, "{{JOB}} token without a job scope, substituting empty");
                }
            },
            "PREFIX" => out.push_str(ctx.prefix.unwrap_or("")),
            "SUFFIX" => out.push_str(ctx.suffix.unwrap_or("")),
            _ => {
                // Unknown token passes through with its braces.
                out.push_str(&after_open[..=close]);
            }
        }
        rest = &after_open[close + 1..];
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Static syntax check: balanced token delimiters and at least one counter
/// token. Touches no storage.
pub fn validate_pattern(pattern: &str) -> PatternValidation {
    let mut errors = Vec::new();

    if pattern.trim().is_empty() {
        errors.push("pattern is empty".to_string());
    }

    let mut depth = 0usize;
    for (pos, ch) in pattern.char_indices() {
        match ch {
            '{' => {
                if depth > 0 {
                    errors.push(format!("nested '{{' at position {}", pos));
                    break;
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    errors.push(format!("unmatched '}}' at position {}", pos));
                    break;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        errors.push("unclosed '{' delimiter".to_string());
    }

    let has_counter =
        pattern.contains("{###}") || pattern.contains("{##}") || pattern.contains("{#}");
    if !has_counter {
        errors.push("pattern must contain a counter token ({#}, {##} or {###})".to_string());
    }

    PatternValidation { valid: errors.is_empty(), errors }
}
