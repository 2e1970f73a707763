//! `{{name}}` placeholder substitution for WGSL templates.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("no value for placeholder `{{{{{0}}}}}`")]
    UnknownPlaceholder(String),
    #[error("placeholder opened at byte {0} is never closed")]
    Unterminated(usize),
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replaces every `{{name}}` in `source` with `values[name]`.
///
/// Whitespace around the name is ignored. Substituted values are not scanned
/// again.
pub fn interpolate(source: &str, values: &BTreeMap<&str, String>) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(TemplateError::Unterminated(offset + start))?;
        let name = after_open[..end].trim();
        let value = values
            .get(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_owned()))?;
        output.push_str(value);

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
    output.push_str(rest);

    Ok(output)
}

/// Distinct placeholder names in order of first appearance.
pub fn placeholders(source: &str) -> Result<Vec<&str>, TemplateError> {
    let mut names = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(TemplateError::Unterminated(offset + start))?;
        let name = after_open[..end].trim();
        if !names.contains(&name) {
            names.push(name);
        }

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }

    Ok(names)
}
