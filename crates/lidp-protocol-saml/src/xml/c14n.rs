//! Exclusive XML Canonicalization 1.0, without comments.
//!
//! <http://www.w3.org/2001/10/xml-exc-c14n#>. Input is an [`Element`]
//! subtree together with the namespace bindings in scope above it; only
//! namespaces visibly utilized by an element (or listed in the
//! `InclusiveNamespaces` prefix list) are rendered, and only where they
//! differ from what the nearest output ancestor already rendered.

use super::dom::{Attribute, Element, Node, XML_NS};

/// Algorithm URI of exclusive canonicalization without comments.
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Canonicalizes `element`.
///
/// `inherited` holds the namespace bindings in scope above the element
/// (see [`Element::scope_at`]). `inclusive_prefixes` is the
/// `InclusiveNamespaces/@PrefixList`, with `#default` naming the default
/// namespace.
#[must_use]
pub fn canonicalize(
    element: &Element,
    inherited: &[(String, String)],
    inclusive_prefixes: &[String],
) -> String {
    let inclusive: Vec<String> = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();

    let mut out = String::new();
    let mut scope: Vec<(String, String)> = inherited.to_vec();
    let mut rendered: Vec<(String, String)> = Vec::new();
    write_element(element, &mut scope, &mut rendered, &inclusive, &mut out);
    out
}

fn write_element(
    element: &Element,
    scope: &mut Vec<(String, String)>,
    rendered: &mut Vec<(String, String)>,
    inclusive: &[String],
    out: &mut String,
) {
    let scope_len = scope.len();
    scope.extend(element.namespaces.iter().cloned());

    // Prefixes this element needs declared, with the URI each one binds to.
    let mut needed: Vec<(String, String)> = Vec::new();
    let element_prefix = element.prefix.clone().unwrap_or_default();
    needed.push((
        element_prefix,
        element.namespace.clone().unwrap_or_default(),
    ));
    for attr in &element.attributes {
        if let (Some(prefix), Some(uri)) = (&attr.prefix, &attr.namespace) {
            push_unique(&mut needed, prefix, uri);
        }
    }
    for prefix in inclusive {
        if let Some(uri) = lookup(scope, prefix) {
            push_unique(&mut needed, prefix, &uri);
        }
    }

    let mut declarations: Vec<(String, String)> = needed
        .into_iter()
        .filter(|(prefix, uri)| {
            if prefix == "xml" && uri == XML_NS {
                return false;
            }
            let current = lookup(rendered, prefix).unwrap_or_default();
            current != *uri
        })
        .collect();
    declarations.sort_by(|a, b| a.0.cmp(&b.0));

    let rendered_len = rendered.len();
    rendered.extend(declarations.iter().cloned());

    let qname = element.qname();
    out.push('<');
    out.push_str(&qname);
    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attr(uri, out);
        out.push('"');
    }

    let mut attributes: Vec<&Attribute> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_ns = a.namespace.as_deref().unwrap_or("");
        let b_ns = b.namespace.as_deref().unwrap_or("");
        a_ns.cmp(b_ns).then_with(|| a.local_name.cmp(&b.local_name))
    });
    for attr in attributes {
        out.push(' ');
        out.push_str(&attr.qname());
        out.push_str("=\"");
        escape_attr(&attr.value, out);
        out.push('"');
    }
    out.push('>');

    for child in &element.children {
        match child {
            Node::Element(e) => write_element(e, scope, rendered, inclusive, out),
            Node::Text(t) => escape_text(t, out),
        }
    }

    out.push_str("</");
    out.push_str(&qname);
    out.push('>');

    rendered.truncate(rendered_len);
    scope.truncate(scope_len);
}

fn push_unique(needed: &mut Vec<(String, String)>, prefix: &str, uri: &str) {
    if !needed.iter().any(|(p, _)| p == prefix) {
        needed.push((prefix.to_string(), uri.to_string()));
    }
}

fn lookup(bindings: &[(String, String)], prefix: &str) -> Option<String> {
    bindings
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.clone())
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
