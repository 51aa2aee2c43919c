// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Merge engine: replaces `{{token}}` placeholders in a template body with
// entity field values.
//
// Merging is pure: the same template and data always yield the same string.

use std::ops::Range;

use docseal_core::error::{DocsealError, Result};
use docseal_core::lifecycle::first_missing_field;
use docseal_core::types::{EntityData, Template};
use tracing::{debug, instrument};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// One `{{ name }}` occurrence in a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Token name with surrounding whitespace removed.
    pub name: &'a str,
    /// Byte range of the whole placeholder, braces included.
    pub span: Range<usize>,
}

/// Scan `body` for placeholders.
///
/// Fails with a human-readable reason on an unterminated `{{` or an empty
/// token name.
pub fn placeholders(body: &str) -> std::result::Result<Vec<Placeholder<'_>>, String> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = body[cursor..].find(OPEN) {
        let start = cursor + offset;
        let inner_start = start + OPEN.len();
        let Some(close) = body[inner_start..].find(CLOSE) else {
            return Err(format!("unterminated placeholder at byte {start}"));
        };
        let inner_end = inner_start + close;
        let name = body[inner_start..inner_end].trim();
        if name.is_empty() {
            return Err(format!("empty placeholder at byte {start}"));
        }
        if name.contains(OPEN) {
            return Err(format!("nested placeholder at byte {start}"));
        }
        let end = inner_end + CLOSE.len();
        found.push(Placeholder {
            name,
            span: start..end,
        });
        cursor = end;
    }

    Ok(found)
}

/// Fill every placeholder in `template.body` from `data`.
///
/// Every field in `required_fields` and every token in the body must be
/// present in `data`; the first absent one is reported as `MissingField`.
/// Values that contain placeholder delimiters are rejected, and so is any
/// output where a value and the surrounding text join into a new `{{`.
#[instrument(skip_all, fields(template = %template.id))]
pub fn merge(template: &Template, data: &EntityData) -> Result<String> {
    if let Some(field) = first_missing_field(template, data) {
        return Err(DocsealError::MissingField(field.to_owned()));
    }

    let tokens = placeholders(&template.body).map_err(|reason| DocsealError::InvalidTemplate {
        id: template.id.clone(),
        reason,
    })?;

    let mut out = String::with_capacity(template.body.len());
    let mut last = 0;
    for token in &tokens {
        let value = data
            .get(token.name)
            .ok_or_else(|| DocsealError::MissingField(token.name.to_owned()))?;
        if value.contains(OPEN) || value.contains(CLOSE) {
            return Err(DocsealError::BadRequest(format!(
                "value for {} contains placeholder delimiters",
                token.name
            )));
        }
        out.push_str(&template.body[last..token.span.start]);
        out.push_str(value);
        last = token.span.end;
    }
    out.push_str(&template.body[last..]);
    if let Some(at) = out.find(OPEN) {
        return Err(DocsealError::BadRequest(format!(
            "merged output contains a placeholder delimiter at byte {at}"
        )));
    }

    debug!(tokens = tokens.len(), len = out.len(), "merge complete");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseal_core::types::SignerRole;

    fn salary_template() -> Template {
        Template {
            id: "salary-certificate".into(),
            name: "Salary Certificate".into(),
            document_type: "SALARY_CERTIFICATE".into(),
            body: "This certifies {{name}} earns {{salary}} SAR".into(),
            required_fields: vec!["name".into(), "salary".into()],
            required_signer_roles: [SignerRole::new("HR_MANAGER")].into_iter().collect(),
        }
    }

    fn data(pairs: &[(&str, &str)]) -> EntityData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn merges_salary_certificate() {
        let out = merge(
            &salary_template(),
            &data(&[("name", "Ahmed Ali"), ("salary", "15000")]),
        )
        .unwrap();
        assert_eq!(out, "This certifies Ahmed Ali earns 15000 SAR");
    }

    #[test]
    fn extra_fields_are_ignored_and_output_is_deterministic() {
        let d = data(&[("name", "Ahmed Ali"), ("salary", "15000"), ("dept", "Ops")]);
        let a = merge(&salary_template(), &d).unwrap();
        let b = merge(&salary_template(), &d).unwrap();
        assert_eq!(a, b);
        assert!(!a.contains("{{"));
    }

    #[test]
    fn missing_required_field_is_named() {
        let err = merge(&salary_template(), &data(&[("name", "Ahmed Ali")])).unwrap_err();
        assert!(matches!(err, DocsealError::MissingField(f) if f == "salary"));
    }

    #[test]
    fn body_token_outside_required_fields_is_still_required() {
        let mut template = salary_template();
        template.body.push_str(" from {{start_date}}");
        let err = merge(
            &template,
            &data(&[("name", "Ahmed Ali"), ("salary", "15000")]),
        )
        .unwrap_err();
        assert!(matches!(err, DocsealError::MissingField(f) if f == "start_date"));
    }

    #[test]
    fn whitespace_inside_braces_is_ignored() {
        let mut template = salary_template();
        template.body = "Dear {{ name }},".into();
        let out = merge(&template, &data(&[("name", "Ahmed Ali"), ("salary", "1")])).unwrap();
        assert_eq!(out, "Dear Ahmed Ali,");
    }

    #[test]
    fn values_with_delimiters_are_rejected() {
        let err = merge(
            &salary_template(),
            &data(&[("name", "{{salary}}"), ("salary", "15000")]),
        )
        .unwrap_err();
        assert!(matches!(err, DocsealError::BadRequest(_)));
    }

    #[test]
    fn scanner_reports_malformed_bodies() {
        assert!(placeholders("Hello {{name").is_err());
        assert!(placeholders("Hello {{  }}").is_err());
        assert!(placeholders("Hello {{a {{b}}").is_err());

        let found = placeholders("{{a}} and {{ b }}").unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(found[0].span, 0..5);
    }

    #[test]
    fn body_without_placeholders_is_returned_as_is() {
        let mut template = salary_template();
        template.body = "No tokens here.".into();
        template.required_fields.clear();
        assert_eq!(merge(&template, &EntityData::new()).unwrap(), "No tokens here.");
    }

    #[test]
    fn value_joining_body_text_into_a_delimiter_is_rejected() {
        let template = Template {
            body: "{{name}}{x}}".into(),
            required_fields: vec!["name".into()],
            ..salary_template()
        };
        let err = merge(&template, &data(&[("name", "a{")])).unwrap_err();
        assert!(matches!(err, DocsealError::BadRequest(_)));

        let merged = merge(&template, &data(&[("name", "a")])).unwrap();
        assert_eq!(merged, "a{x}}");
    }
}
