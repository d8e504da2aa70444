//! Minimal namespace-aware XML tree.
//!
//! Only what SAML processing needs: elements, attributes, namespace
//! declarations and text. Comments and processing instructions are
//! dropped; DTDs are rejected.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{escape, escape_attr};
use crate::error::{SamlError, SamlResult};

/// Namespace bound to the `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Upper bound on element nesting accepted by the parser.
const MAX_DEPTH: usize = 64;

/// An attribute with its namespace resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Prefix as written, if any.
    pub prefix: Option<String>,
    /// Local part of the name.
    pub local_name: String,
    /// Namespace URI; unprefixed attributes have none.
    pub namespace: Option<String>,
    /// Unescaped value.
    pub value: String,
}

impl Attribute {
    /// Qualified name as written.
    #[must_use]
    pub fn qname(&self) -> String {
        qualified(self.prefix.as_deref(), &self.local_name)
    }
}

/// Child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Character data, unescaped.
    Text(String),
}

/// An element with its namespace resolved at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Prefix as written, if any.
    pub prefix: Option<String>,
    /// Local part of the name.
    pub local_name: String,
    /// Namespace URI of the element.
    pub namespace: Option<String>,
    /// Namespace declarations made on this element as `(prefix, uri)`;
    /// the default namespace uses an empty prefix.
    pub namespaces: Vec<(String, String)>,
    /// Attributes other than namespace declarations, in document order.
    pub attributes: Vec<Attribute>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

/// Namespace bindings in scope at some element, nearest last.
pub type Scope = Vec<(String, String)>;

impl Element {
    /// Parses a document and returns its root element.
    ///
    /// # Errors
    ///
    /// Returns `SamlError::MalformedRequest` for anything that is not a
    /// single well-formed, namespace-valid element tree.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;

        let mut stack: Vec<Element> = Vec::new();
        let mut scopes: Vec<Scope> = vec![Vec::new()];
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    if root.is_some() {
                        return Err(malformed("content after the document element"));
                    }
                    if stack.len() >= MAX_DEPTH {
                        return Err(malformed("document nested too deeply"));
                    }
                    let parent_scope = scopes.last().cloned().unwrap_or_default();
                    let (element, scope) = open_element(&start, parent_scope)?;
                    stack.push(element);
                    scopes.push(scope);
                }
                Event::End(_) => {
                    scopes.pop();
                    let element = stack.pop().ok_or_else(|| malformed("unbalanced end tag"))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    let raw = text.into_inner();
                    let raw = std::str::from_utf8(&raw)
                        .map_err(|e| malformed(&format!("text is not UTF-8: {e}")))?;
                    let text = quick_xml::escape::unescape(&normalize_line_endings(raw))?
                        .into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.push_text(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(malformed("text outside the document element")),
                    }
                }
                Event::CData(data) => {
                    let bytes = data.into_inner();
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| malformed(&format!("CDATA is not UTF-8: {e}")))?;
                    match stack.last_mut() {
                        Some(parent) => parent.push_text(&normalize_line_endings(text)),
                        None => return Err(malformed("CDATA outside the document element")),
                    }
                }
                Event::DocType(_) => return Err(malformed("DTDs are not accepted")),
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::Empty(_) => {}
                Event::Eof => break,
            }
        }

        if !stack.is_empty() {
            return Err(malformed("unexpected end of document"));
        }
        root.ok_or_else(|| malformed("empty document"))
    }

    /// Qualified name as written.
    #[must_use]
    pub fn qname(&self) -> String {
        qualified(self.prefix.as_deref(), &self.local_name)
    }

    /// True if this element has the given namespace and local name.
    #[must_use]
    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(namespace)
    }

    /// Value of an unqualified attribute.
    #[must_use]
    pub fn attr(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespace-qualified attribute.
    #[must_use]
    pub fn attr_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name.
    #[must_use]
    pub fn child(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(namespace, local_name))
    }

    /// All child elements with the given name.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(namespace, local_name))
    }

    /// First descendant (depth-first, excluding `self`) with the given name.
    #[must_use]
    pub fn descendant(&self, namespace: &str, local_name: &str) -> Option<&Element> {
        for child in self.elements() {
            if child.is(namespace, local_name) {
                return Some(child);
            }
            if let Some(found) = child.descendant(namespace, local_name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text content of this element and its descendants.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    /// Trimmed text of the named child, if present.
    #[must_use]
    pub fn child_text(&self, namespace: &str, local_name: &str) -> Option<String> {
        self.child(namespace, local_name)
            .map(|e| e.text().trim().to_string())
    }

    /// Element at a path of child-element indices below `self`.
    #[must_use]
    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = current.elements().nth(index)?;
        }
        Some(current)
    }

    /// Paths (child-element indices) of every element, `self` included,
    /// whose `ID` attribute equals `id`.
    #[must_use]
    pub fn paths_by_id(&self, id: &str) -> Vec<Vec<usize>> {
        let mut found = Vec::new();
        let mut path = Vec::new();
        self.collect_ids(id, &mut path, &mut found);
        found
    }

    /// Paths of every descendant-or-self element with the given name.
    #[must_use]
    pub fn paths_named(&self, namespace: &str, local_name: &str) -> Vec<Vec<usize>> {
        let mut found = Vec::new();
        let mut path = Vec::new();
        self.collect_named(namespace, local_name, &mut path, &mut found);
        found
    }

    /// Namespace bindings in scope for the element at `path`, excluding
    /// the declarations made on that element itself.
    #[must_use]
    pub fn scope_at(&self, path: &[usize]) -> Scope {
        let mut scope = Vec::new();
        let mut current = self;
        for &index in path {
            scope.extend(current.namespaces.iter().cloned());
            match current.elements().nth(index) {
                Some(next) => current = next,
                None => break,
            }
        }
        scope
    }

    /// Removes and returns the child element at `index` among element
    /// children.
    pub fn remove_element(&mut self, index: usize) -> Option<Element> {
        let position = self.element_position(index)?;
        match self.children.remove(position) {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    /// Inserts `element` so that it becomes element child number `index`.
    pub fn insert_element(&mut self, index: usize, element: Element) {
        let position = self
            .element_position(index)
            .unwrap_or(self.children.len());
        self.children.insert(position, Node::Element(element));
    }

    /// Mutable access to the element at a path below `self`.
    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            let position = current.element_position(index)?;
            current = match current.children.get_mut(position) {
                Some(Node::Element(e)) => e,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Serializes the tree back to XML, keeping prefixes and namespace
    /// declarations as parsed.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        let qname = self.qname();
        out.push('<');
        out.push_str(&qname);
        for (prefix, uri) in &self.namespaces {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
            }
            out.push_str(&escape_attr(uri));
            out.push('"');
        }
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.qname());
            out.push_str("=\"");
            out.push_str(&escape_attr(&attr.value));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_xml(out),
                Node::Text(t) => out.push_str(&escape(t)),
            }
        }
        out.push_str("</");
        out.push_str(&qname);
        out.push('>');
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(existing)) = self.children.last_mut() {
            existing.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Element(e) => e.collect_text(out),
                Node::Text(t) => out.push_str(t),
            }
        }
    }

    fn element_position(&self, index: usize) -> Option<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node, Node::Element(_)))
            .nth(index)
            .map(|(position, _)| position)
    }

    fn collect_ids(&self, id: &str, path: &mut Vec<usize>, found: &mut Vec<Vec<usize>>) {
        if self.attr("ID") == Some(id) {
            found.push(path.clone());
        }
        for (index, child) in self.elements().enumerate() {
            path.push(index);
            child.collect_ids(id, path, found);
            path.pop();
        }
    }

    fn collect_named(
        &self,
        namespace: &str,
        local_name: &str,
        path: &mut Vec<usize>,
        found: &mut Vec<Vec<usize>>,
    ) {
        if self.is(namespace, local_name) {
            found.push(path.clone());
        }
        for (index, child) in self.elements().enumerate() {
            path.push(index);
            child.collect_named(namespace, local_name, path, found);
            path.pop();
        }
    }
}

/// Looks up `prefix` (empty for the default namespace) in a scope.
#[must_use]
pub fn resolve<'a>(scope: &'a [(String, String)], prefix: &str) -> Option<&'a str> {
    if prefix == "xml" {
        return Some(XML_NS);
    }
    scope
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str())
        .filter(|uri| !uri.is_empty())
}

fn open_element(start: &BytesStart<'_>, mut scope: Scope) -> SamlResult<(Element, Scope)> {
    let name = utf8(start.name().as_ref())?;
    let (prefix, local_name) = split_qname(&name);

    let mut namespaces = Vec::new();
    let mut raw_attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = utf8(attr.key.as_ref())?;
        let raw = std::str::from_utf8(&attr.value)
            .map_err(|e| malformed(&format!("attribute {key} is not UTF-8: {e}")))?;
        let value = quick_xml::escape::unescape(&normalize_attribute_value(raw))?.into_owned();
        if key == "xmlns" {
            namespaces.push((String::new(), value));
        } else if let Some(declared) = key.strip_prefix("xmlns:") {
            if value.is_empty() {
                return Err(malformed(&format!("prefix {declared} bound to empty namespace")));
            }
            namespaces.push((declared.to_string(), value));
        } else {
            raw_attributes.push((key, value));
        }
    }
    scope.extend(namespaces.iter().cloned());

    let namespace = match prefix {
        Some(p) => Some(
            resolve(&scope, p)
                .ok_or_else(|| malformed(&format!("unbound prefix {p}")))?
                .to_string(),
        ),
        None => resolve(&scope, "").map(str::to_string),
    };

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let (attr_prefix, attr_local) = split_qname(&key);
        let attr_namespace = match attr_prefix {
            Some(p) => Some(
                resolve(&scope, p)
                    .ok_or_else(|| malformed(&format!("unbound prefix {p}")))?
                    .to_string(),
            ),
            None => None,
        };
        attributes.push(Attribute {
            prefix: attr_prefix.map(str::to_string),
            local_name: attr_local.to_string(),
            namespace: attr_namespace,
            value,
        });
    }

    let element = Element {
        prefix: prefix.map(str::to_string),
        local_name: local_name.to_string(),
        namespace,
        namespaces,
        attributes,
        children: Vec::new(),
    };
    Ok((element, scope))
}

/// Line-ending normalization (XML 1.0 section 2.11): CRLF and a lone CR
/// become LF. Applied to raw text before references are expanded.
fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\r') {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute-value normalization (XML 1.0 section 3.3.3) for CDATA
/// attributes: literal tab, CR and LF become a space. Character
/// references are expanded afterwards and keep their value.
fn normalize_attribute_value(raw: &str) -> Cow<'_, str> {
    let normalized = normalize_line_endings(raw);
    if !normalized.contains(['\t', '\n']) {
        return normalized;
    }
    Cow::Owned(normalized.replace(['\t', '\n'], " "))
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn qualified(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local_name}"),
        None => local_name.to_string(),
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| malformed(&format!("name is not UTF-8: {e}")))
}

fn malformed(msg: &str) -> SamlError {
    SamlError::MalformedRequest(msg.to_string())
}
