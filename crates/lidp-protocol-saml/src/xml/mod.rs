//! XML tree, canonicalization and small writing helpers.

pub mod c14n;
pub mod dom;

pub use c14n::{EXC_C14N, canonicalize};
pub use dom::{Attribute, Element, Node, Scope};

use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{SamlError, SamlResult};

/// XML declaration written in front of every complete document.
pub const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Escapes text for element content.
///
/// A carriage return is written as a character reference so that a
/// parser's line-ending normalization does not turn it into a newline.
#[must_use]
pub fn escape(text: &str) -> Cow<'_, str> {
    let escaped = quick_xml::escape::escape(text);
    if !escaped.contains('\r') {
        return escaped;
    }
    Cow::Owned(escaped.replace('\r', "&#xD;"))
}

/// Escapes a value for a double-quoted attribute.
///
/// Tab, newline and carriage return are written as character references,
/// since attribute-value normalization would otherwise turn them into
/// spaces.
#[must_use]
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    let escaped = quick_xml::escape::escape(value);
    if !escaped.contains(['\t', '\n', '\r']) {
        return escaped;
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Formats an `xs:dateTime` in UTC with millisecond precision.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an `xs:dateTime`.
///
/// # Errors
///
/// Returns `SamlError::MalformedRequest` if the value is not RFC 3339.
pub fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::MalformedRequest(format!("bad timestamp {value:?}: {e}")))
}

/// Renders ` name="value"` when `value` is present.
#[must_use]
pub fn optional_attr(name: &str, value: Option<&str>) -> String {
    value
        .map(|v| format!(r#" {name}="{}""#, escape_attr(v)))
        .unwrap_or_default()
}

/// Reads a required unqualified attribute.
///
/// # Errors
///
/// Returns `SamlError::MalformedRequest` naming the missing attribute.
pub fn required_attr<'a>(element: &'a Element, name: &str) -> SamlResult<&'a str> {
    element.attr(name).ok_or_else(|| {
        SamlError::MalformedRequest(format!("{} is missing {name}", element.local_name))
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn instants_use_utc_millis() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_instant(instant), "2024-01-02T03:04:05.000Z");
        assert_eq!(parse_instant("2024-01-02T03:04:05Z").unwrap(), instant);
        assert_eq!(parse_instant("2024-01-02T05:04:05+02:00").unwrap(), instant);
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn control_whitespace_survives_a_reparse() {
        assert_eq!(escape("a\r\nb<"), "a&#xD;\nb&lt;");
        assert_eq!(escape_attr("x\ny\tz\r"), "x&#xA;y&#x9;z&#xD;");
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));

        let xml = format!(
            "<e a=\"{}\">{}</e>",
            escape_attr("one\ntwo\tthree"),
            escape("line\r\nnext")
        );
        let parsed = Element::parse(&xml).unwrap();
        assert_eq!(parsed.attr("a"), Some("one\ntwo\tthree"));
        assert_eq!(parsed.text(), "line\r\nnext");
    }

    #[test]
    fn optional_attributes() {
        assert_eq!(optional_attr("A", Some("x\"y")), r#" A="x&quot;y""#);
        assert_eq!(optional_attr("A", None), "");
    }
}
