//! `{ref:<name>}` placeholders.
//!
//! A value such as `{ref:APP_ID}-dev` is split into literal text and
//! references to other variables. Anything that is not a complete
//! `{ref:...}` token stays literal.

use crate::error::Result;

const OPEN: &str = "{ref:";
const CLOSE: char = '}';

/// A segment of a value that may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part<'a> {
    /// Text copied verbatim.
    Literal(&'a str),
    /// `{ref:NAME}`, replaced with the staged value of `NAME`.
    Ref(&'a str),
}

/// Split `value` into literal and reference parts.
pub fn parse(value: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            break;
        };
        let name = after[..end].trim();
        if name.is_empty() {
            // `{ref:}` is literal text
            parts.push(Part::Literal(&rest[..start + OPEN.len() + end + 1]));
        } else {
            if start > 0 {
                parts.push(Part::Literal(&rest[..start]));
            }
            parts.push(Part::Ref(name));
        }
        rest = &after[end + 1..];
    }

    if !rest.is_empty() {
        parts.push(Part::Literal(rest));
    }
    parts
}

/// Names referenced by `value`, in order of appearance.
pub fn references(value: &str) -> Vec<&str> {
    parse(value)
        .into_iter()
        .filter_map(|part| match part {
            Part::Ref(name) => Some(name),
            Part::Literal(_) => None,
        })
        .collect()
}

/// Whether `value` contains at least one placeholder.
pub fn has_references(value: &str) -> bool {
    parse(value).iter().any(|p| matches!(p, Part::Ref(_)))
}

/// Replace every placeholder with the result of `resolve`.
///
/// # Errors
///
/// Propagates the first error returned by `resolve`.
pub fn expand<F>(value: &str, mut resolve: F) -> Result<String>
where
    F: FnMut(&str) -> Result<String>,
{
    let mut out = String::with_capacity(value.len());
    for part in parse(value) {
        match part {
            Part::Literal(text) => out.push_str(text),
            Part::Ref(name) => out.push_str(&resolve(name)?),
        }
    }
    Ok(out)
}
