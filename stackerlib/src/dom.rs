//! Host document adapter.
//!
//! Documents are parsed with `html5ever` into an `RcDom`. Its nodes are
//! reference counted and interior-mutable, so a [`Handle`] to a table is all
//! that is needed to toggle classes or insert a sibling later on, without
//! holding on to the [`Document`] itself.
//!
//! The free functions here are the small set of element operations the
//! stacker needs: attribute and class access, child traversal, serialization,
//! and sibling insertion of generated [`markup::Element`](crate::markup::Element)
//! trees.

use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, parse_fragment, ParseOpts};
use markup5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{NodeData, RcDom, SerializableHandle};

use crate::markup::{self, Element};
use crate::Result;

pub use markup5ever_rcdom::Handle;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed HTML document.
pub struct Document {
    dom: RcDom,
}

impl Document {
    /// Parse a complete HTML document.
    ///
    /// HTML parsing is error-tolerant, so this never fails: malformed input is
    /// repaired the way browsers repair it.
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        Self { dom }
    }

    /// Parse a document from a UTF-8 byte stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let dom = parse_document(RcDom::default(), ParseOpts::default())
            .from_utf8()
            .read_from(reader)?;
        Ok(Self { dom })
    }

    /// All `<table>` elements in document order, nested tables included.
    pub fn tables(&self) -> Vec<Handle> {
        self.elements_named("table")
    }

    /// All elements with the given tag name, in document order.
    pub fn elements_named(&self, name: &str) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_descendants(&self.dom.document, &mut |handle| {
            if is_element(handle, name) {
                found.push(handle.clone());
            }
        });
        found
    }

    /// First element whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<Handle> {
        let mut found = None;
        collect_descendants(&self.dom.document, &mut |handle| {
            if found.is_none() && attr(handle, "id").as_deref() == Some(id) {
                found = Some(handle.clone());
            }
        });
        found
    }

    /// The `<head>` element (always present after parsing).
    pub fn head(&self) -> Option<Handle> {
        self.elements_named("head").into_iter().next()
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        serialize_handle(&self.dom.document, TraversalScope::ChildrenOnly(None))
    }
}

fn collect_descendants(handle: &Handle, visit: &mut dyn FnMut(&Handle)) {
    for child in handle.children.borrow().iter() {
        visit(child);
        collect_descendants(child, visit);
        if let NodeData::Element {
            template_contents, ..
        } = &child.data
        {
            if let Some(contents) = template_contents.borrow().as_ref() {
                collect_descendants(contents, visit);
            }
        }
    }
}

fn serialize_handle(handle: &Handle, scope: TraversalScope) -> String {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    let node = SerializableHandle::from(handle.clone());
    // Writing into a Vec cannot fail.
    if serialize(&mut bytes, &node, opts).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

/// Local tag name of an element handle.
pub fn element_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

/// True when `handle` is an element with the given (case-insensitive) tag name.
pub fn is_element(handle: &Handle, tag: &str) -> bool {
    match &handle.data {
        NodeData::Element { name, .. } => {
            let local: &str = &name.local;
            local.eq_ignore_ascii_case(tag)
        }
        _ => false,
    }
}

pub fn is_table(handle: &Handle) -> bool {
    is_element(handle, "table")
}

/// Value of an attribute.
pub fn attr(handle: &Handle, name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Set an attribute, replacing an existing value. No-op on non-elements.
pub fn set_attr(handle: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &handle.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|attr| &*attr.name.local == name) {
            Some(existing) => existing.value = StrTendril::from_slice(value),
            None => attrs.push(Attribute {
                name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
                value: StrTendril::from_slice(value),
            }),
        }
    }
}

pub fn remove_attr(handle: &Handle, name: &str) {
    if let NodeData::Element { attrs, .. } = &handle.data {
        attrs
            .borrow_mut()
            .retain(|attr| &*attr.name.local != name);
    }
}

/// The element's class list.
pub fn classes(handle: &Handle) -> Vec<String> {
    attr(handle, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(handle: &Handle, class: &str) -> bool {
    classes(handle).iter().any(|c| c == class)
}

/// Append each whitespace-separated class in `names` that is not yet present.
pub fn add_class(handle: &Handle, names: &str) {
    if !matches!(handle.data, NodeData::Element { .. }) {
        return;
    }
    let mut list = classes(handle);
    let before = list.len();
    for name in names.split_whitespace() {
        if !list.iter().any(|c| c == name) {
            list.push(name.to_string());
        }
    }
    if list.len() != before {
        set_attr(handle, "class", &list.join(" "));
    }
}

/// Remove each whitespace-separated class in `names`.
///
/// The attribute is dropped entirely once the list is empty.
pub fn remove_class(handle: &Handle, names: &str) {
    let mut list = classes(handle);
    let before = list.len();
    list.retain(|c| !names.split_whitespace().any(|name| name == c));
    if list.len() == before {
        return;
    }
    if list.is_empty() {
        remove_attr(handle, "class");
    } else {
        set_attr(handle, "class", &list.join(" "));
    }
}

/// Element children, skipping text and comments.
pub fn child_elements(handle: &Handle) -> Vec<Handle> {
    handle
        .children
        .borrow()
        .iter()
        .filter(|child| matches!(child.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// Element children with the given tag name.
pub fn child_elements_named(handle: &Handle, tag: &str) -> Vec<Handle> {
    handle
        .children
        .borrow()
        .iter()
        .filter(|child| is_element(child, tag))
        .cloned()
        .collect()
}

pub fn parent(handle: &Handle) -> Option<Handle> {
    let weak = handle.parent.take()?;
    let parent = weak.upgrade();
    handle.parent.set(Some(weak));
    parent
}

/// Serialized markup of the children of `handle`.
pub fn inner_html(handle: &Handle) -> String {
    serialize_handle(handle, TraversalScope::ChildrenOnly(None))
}

/// Serialized markup of `handle` itself.
pub fn outer_html(handle: &Handle) -> String {
    serialize_handle(handle, TraversalScope::IncludeNode)
}

/// Append `child` as the last child of `parent`.
pub fn append(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Insert `node` as the next sibling of `handle`.
///
/// Returns `false` (and leaves the tree alone) when `handle` is detached.
pub fn insert_after(handle: &Handle, node: Handle) -> bool {
    let Some(parent) = parent(handle) else {
        return false;
    };
    let mut children = parent.children.borrow_mut();
    let Some(position) = children.iter().position(|child| Rc::ptr_eq(child, handle)) else {
        return false;
    };
    node.parent.set(Some(Rc::downgrade(&parent)));
    children.insert(position + 1, node);
    true
}

/// Remove `handle` from its parent.
pub fn detach(handle: &Handle) {
    if let Some(parent) = parent(handle) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, handle));
    }
    handle.parent.set(None);
}

/// Convert a generated element tree into document nodes.
///
/// Raw fragments are parsed in the context of their parent element so that,
/// for example, content destined for a `<td>` is parsed as cell content.
pub fn from_markup(element: &Element) -> Handle {
    let attrs = element
        .attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(name.as_str())),
            value: StrTendril::from_slice(value),
        })
        .collect();

    let handle = markup5ever_rcdom::Node::new(NodeData::Element {
        name: html_name(&element.name),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    });

    for child in &element.children {
        match child {
            markup::Node::Element(inner) => append(&handle, from_markup(inner)),
            markup::Node::Text(text) => append(&handle, text_node(text)),
            markup::Node::Raw(fragment) => {
                for node in parse_fragment_nodes(fragment, &element.name) {
                    append(&handle, node);
                }
            }
        }
    }

    handle
}

fn text_node(text: &str) -> Handle {
    markup5ever_rcdom::Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

/// Parse a markup fragment as the children of a `context` element.
pub fn parse_fragment_nodes(fragment: &str, context: &str) -> Vec<Handle> {
    if fragment.is_empty() {
        return Vec::new();
    }

    let dom = parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        html_name(context),
        Vec::new(),
    )
    .one(fragment);

    // The fragment parser roots its output in a synthetic <html> element.
    let Some(root) = dom.document.children.borrow().first().cloned() else {
        return Vec::new();
    };

    let nodes: Vec<Handle> = root.children.take();
    for node in &nodes {
        node.parent.set(None);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_find_tables() {
        let doc = Document::parse(
            "<p>intro</p><table id=\"a\"><tr><td><table id=\"b\"></table></td></tr></table>",
        );
        let tables = doc.tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(attr(&tables[0], "id").as_deref(), Some("a"));
        assert_eq!(attr(&tables[1], "id").as_deref(), Some("b"));
        assert!(is_table(&tables[0]));
        assert_eq!(element_name(&tables[0]).as_deref(), Some("table"));
    }

    #[test]
    fn test_read_from_reader() {
        let mut bytes: &[u8] = b"<table id=\"t\"></table>";
        let doc = Document::read_from(&mut bytes).unwrap();
        assert!(doc.find_by_id("t").is_some());
        assert!(doc.head().is_some());
    }

    #[test]
    fn test_class_toggling() {
        let doc = Document::parse("<table id=\"t\" class=\"data\"></table>");
        let table = doc.find_by_id("t").unwrap();

        add_class(&table, "stacker stacker-original");
        add_class(&table, "data");
        assert_eq!(classes(&table), vec!["data", "stacker", "stacker-original"]);

        remove_class(&table, "stacker data");
        assert_eq!(attr(&table, "class").as_deref(), Some("stacker-original"));

        remove_class(&table, "stacker-original");
        assert_eq!(attr(&table, "class"), None);
        assert!(!has_class(&table, "stacker"));
    }

    #[test]
    fn test_inner_and_outer_html() {
        let doc = Document::parse("<table><tr><td class=\"x\">a &amp; <b>b</b></td></tr></table>");
        let cell = doc.elements_named("td").remove(0);
        assert_eq!(inner_html(&cell), "a &amp; <b>b</b>");
        assert_eq!(outer_html(&cell), "<td class=\"x\">a &amp; <b>b</b></td>");
    }

    #[test]
    fn test_insert_after_and_detach() {
        let doc = Document::parse("<div id=\"wrap\"><table id=\"t\"></table><p>after</p></div>");
        let table = doc.find_by_id("t").unwrap();
        let generated = from_markup(&Element::new("table").attr("id", "stacker-t"));

        assert!(insert_after(&table, generated.clone()));
        let wrap = doc.find_by_id("wrap").unwrap();
        assert_eq!(
            inner_html(&wrap),
            "<table id=\"t\"></table><table id=\"stacker-t\"></table><p>after</p>"
        );
        assert!(Rc::ptr_eq(&parent(&generated).unwrap(), &wrap));

        detach(&generated);
        assert_eq!(inner_html(&wrap), "<table id=\"t\"></table><p>after</p>");
        assert!(parent(&generated).is_none());
        assert!(!insert_after(&generated, text_node("x")));
    }

    #[test]
    fn test_from_markup_parses_raw_fragments() {
        let element = Element::new("td")
            .attr("colspan", "2")
            .raw("<em>$9</em> net")
            .text(" & more");
        let handle = from_markup(&element);
        assert_eq!(
            outer_html(&handle),
            "<td colspan=\"2\"><em>$9</em> net &amp; more</td>"
        );
    }
}
