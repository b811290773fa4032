//! Owned, mutable HTML tree for content rewriting
//!
//! `scraper` trees are read-only, so a fragment is copied into plain
//! `ContentNode`s, rewritten in place and serialized back. Attributes removed
//! by the sanitizer are kept aside in `stripped` so later class-based
//! matching still sees them.

use scraper::{ElementRef, Html, Node};

/// Elements serialized without a closing tag
const VOID_ELEMENTS: [&str; 13] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose text is written verbatim
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Element(ContentElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Removed attributes, still consulted by `class_list`
    pub stripped: Vec<(String, String)>,
    pub children: Vec<ContentNode>,
}

/// What `rewrite` does with a visited element
#[derive(Debug)]
pub enum Edit {
    Keep,
    Remove,
    /// Drop the element, keep its children in its place
    Unwrap,
    Replace(ContentNode),
}

impl ContentElement {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Current or stripped value
    pub fn original_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).or_else(|| {
            self.stripped
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(index).1)
    }

    /// Moves `name` into `stripped`
    pub fn strip_attr(&mut self, name: &str) {
        if let Some(value) = self.remove_attr(name) {
            self.stripped.push((name.to_string(), value));
        }
    }

    /// Class tokens, including a stripped `class`
    pub fn class_list(&self) -> Vec<&str> {
        self.original_attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list().contains(&class)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// First descendant element named `name`
    pub fn find_mut(&mut self, name: &str) -> Option<&mut ContentElement> {
        find_in_mut(&mut self.children, name)
    }

    pub fn descendants(&self) -> Vec<&ContentElement> {
        let mut out = Vec::new();
        collect_elements(&self.children, &mut out);
        out
    }
}

fn find_in_mut<'a>(nodes: &'a mut [ContentNode], name: &str) -> Option<&'a mut ContentElement> {
    for node in nodes {
        if let ContentNode::Element(el) = node {
            if el.name == name {
                return Some(el);
            }
            if let Some(found) = find_in_mut(&mut el.children, name) {
                return Some(found);
            }
        }
    }
    None
}

fn collect_text(nodes: &[ContentNode], out: &mut String) {
    for node in nodes {
        match node {
            ContentNode::Text(t) => out.push_str(t),
            ContentNode::Element(el) => collect_text(&el.children, out),
        }
    }
}

fn collect_elements<'a>(nodes: &'a [ContentNode], out: &mut Vec<&'a ContentElement>) {
    for node in nodes {
        if let ContentNode::Element(el) = node {
            out.push(el);
            collect_elements(&el.children, out);
        }
    }
}

/// Parses an HTML fragment (body context)
pub fn parse_fragment(html: &str) -> Vec<ContentNode> {
    let fragment = Html::parse_fragment(html);
    convert_children(fragment.root_element())
}

fn convert_children(element: ElementRef<'_>) -> Vec<ContentNode> {
    element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(ContentNode::Text(text.to_string())),
            Node::Element(_) => ElementRef::wrap(child).map(|el| {
                ContentNode::Element(ContentElement {
                    name: el.value().name().to_string(),
                    attrs: el
                        .value()
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    stripped: Vec::new(),
                    children: convert_children(el),
                })
            }),
            _ => None,
        })
        .collect()
}

pub fn text_of(nodes: &[ContentNode]) -> String {
    let mut out = String::new();
    collect_text(nodes, &mut out);
    out
}

/// Every element, pre-order
pub fn elements(nodes: &[ContentNode]) -> Vec<&ContentElement> {
    let mut out = Vec::new();
    collect_elements(nodes, &mut out);
    out
}

/// Visits every element pre-order
pub fn for_each_element<F>(nodes: &mut [ContentNode], f: &mut F)
where
    F: FnMut(&mut ContentElement),
{
    for node in nodes {
        if let ContentNode::Element(el) = node {
            f(el);
            for_each_element(&mut el.children, f);
        }
    }
}

/// Visits every text node
pub fn for_each_text<F>(nodes: &mut [ContentNode], f: &mut F)
where
    F: FnMut(&mut String),
{
    for node in nodes {
        match node {
            ContentNode::Text(t) => f(t),
            ContentNode::Element(el) => for_each_text(&mut el.children, f),
        }
    }
}

/// Applies `f` top-down. Removed and replaced elements are not descended
/// into; unwrapped children are visited.
pub fn rewrite<F>(nodes: &mut Vec<ContentNode>, f: &mut F)
where
    F: FnMut(&mut ContentElement) -> Edit,
{
    let previous = std::mem::take(nodes);
    for node in previous {
        match node {
            ContentNode::Element(mut el) => match f(&mut el) {
                Edit::Keep => {
                    rewrite(&mut el.children, f);
                    nodes.push(ContentNode::Element(el));
                }
                Edit::Remove => {}
                Edit::Unwrap => {
                    let mut children = std::mem::take(&mut el.children);
                    rewrite(&mut children, f);
                    nodes.extend(children);
                }
                Edit::Replace(replacement) => nodes.push(replacement),
            },
            text => nodes.push(text),
        }
    }
}

/// Drops elements matching `predicate`, subtree included
pub fn remove_elements<P>(nodes: &mut Vec<ContentNode>, predicate: P) -> usize
where
    P: Fn(&ContentElement) -> bool,
{
    let mut removed = 0;
    rewrite(nodes, &mut |el: &mut ContentElement| {
        if predicate(el) {
            removed += 1;
            Edit::Remove
        } else {
            Edit::Keep
        }
    });
    removed
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

pub fn serialize(nodes: &[ContentNode]) -> String {
    let mut out = String::new();
    write_nodes(nodes, false, &mut out);
    out
}

fn write_nodes(nodes: &[ContentNode], raw_text: bool, out: &mut String) {
    for node in nodes {
        match node {
            ContentNode::Text(t) if raw_text => out.push_str(t),
            ContentNode::Text(t) => escape_text(t, out),
            ContentNode::Element(el) => write_element(el, out),
        }
    }
}

fn write_element(el: &ContentElement, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        // boolean attributes are written bare
        if !value.is_empty() {
            out.push_str("=\"");
            escape_attr(value, out);
            out.push('"');
        }
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&el.name.as_str()) {
        return;
    }
    write_nodes(&el.children, RAW_TEXT_ELEMENTS.contains(&el.name.as_str()), out);
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}
