//! The rendered content tree.
//!
//! The scanner never touches a real page; it emits `Node`s that a host
//! turns into whatever display it owns. `to_html` is provided for hosts
//! that want markup and for tests.

use serde::{Deserialize, Serialize};

/// A rendered node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Text(String),
    /// Author-supplied markup passed through unescaped.
    Html(String),
    Element(Element),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    /// The concatenated text content of this node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) | Node::Html(t) => out.push_str(t),
            Node::Element(e) => {
                for child in &e.children {
                    child.collect_text(out);
                }
            }
        }
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

/// The kind of a rendered element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tag {
    Table,
    Caption,
    TableHead,
    TableBody,
    TableFoot,
    Row,
    Cell,
    HeaderCell,
    Rule,
    Heading(u8),
    Preformatted,
    Code,
    BlockQuote,
    UnorderedList,
    OrderedList,
    ListItem,
    Strong,
    Emphasis,
    Underline,
    Strike,
    Subscript,
    Superscript,
    Span,
    LineBreak,
    Image,
    Link(Link),
}

impl Tag {
    /// The HTML element name for this tag.
    pub fn html_name(&self) -> String {
        match self {
            Tag::Table => "table".into(),
            Tag::Caption => "caption".into(),
            Tag::TableHead => "thead".into(),
            Tag::TableBody => "tbody".into(),
            Tag::TableFoot => "tfoot".into(),
            Tag::Row => "tr".into(),
            Tag::Cell => "td".into(),
            Tag::HeaderCell => "th".into(),
            Tag::Rule => "hr".into(),
            Tag::Heading(level) => format!("h{level}"),
            Tag::Preformatted => "pre".into(),
            Tag::Code => "code".into(),
            Tag::BlockQuote => "blockquote".into(),
            Tag::UnorderedList => "ul".into(),
            Tag::OrderedList => "ol".into(),
            Tag::ListItem => "li".into(),
            Tag::Strong => "strong".into(),
            Tag::Emphasis => "em".into(),
            Tag::Underline => "u".into(),
            Tag::Strike => "strike".into(),
            Tag::Subscript => "sub".into(),
            Tag::Superscript => "sup".into(),
            Tag::Span => "span".into(),
            Tag::LineBreak => "br".into(),
            Tag::Image => "img".into(),
            Tag::Link(_) => "a".into(),
        }
    }

    fn is_void(&self) -> bool {
        matches!(self, Tag::Rule | Tag::LineBreak | Tag::Image)
    }
}

/// Where an activated link leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    /// A passage link; `broken` when the store lacked the title at render time.
    Passage { title: String, broken: bool },
    /// A link outside the story.
    External { url: String },
    /// Return to a recorded point in history.
    Back { token: String },
    /// A one-shot action that is suppressed once followed.
    Action { title: String, broken: bool },
}

impl Link {
    /// The visual class hosts style the link with.
    pub fn class(&self) -> &'static str {
        match self {
            Link::Passage { broken: false, .. } | Link::Action { broken: false, .. } => {
                "internalLink"
            }
            Link::Passage { broken: true, .. } | Link::Action { broken: true, .. } => "brokenLink",
            Link::External { .. } => "externalLink",
            Link::Back { .. } => "back",
        }
    }

    fn href(&self) -> String {
        match self {
            Link::External { url } => url.clone(),
            Link::Back { token } => token.clone(),
            Link::Passage { .. } | Link::Action { .. } => "javascript:void(0)".to_string(),
        }
    }
}

/// A rendered element with children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: Tag,
    pub class: Option<String>,
    /// Attributes in insertion order.
    pub attrs: Vec<(String, String)>,
    /// Inline style declarations as (property, value).
    pub styles: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            class: None,
            attrs: Vec::new(),
            styles: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn link(link: Link) -> Self {
        let class = link.class().to_string();
        Self::new(Tag::Link(link)).with_class(class)
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Set an attribute, replacing an earlier value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn link_target(&self) -> Option<&Link> {
        match &self.tag {
            Tag::Link(link) => Some(link),
            _ => None,
        }
    }
}

/// The inline error markup shown where a macro or block failed.
pub fn error_node(message: impl Into<String>) -> Node {
    Element::new(Tag::Strong)
        .with_child(
            Element::new(Tag::Span)
                .with_class("marked")
                .with_text(message),
        )
        .into()
}

/// Concatenated text content of a node list.
pub fn text_content(nodes: &[Node]) -> String {
    nodes.iter().map(Node::text_content).collect()
}

/// Every link in a node list, depth first.
pub fn links(nodes: &[Node]) -> Vec<&Link> {
    let mut found = Vec::new();
    collect_links(nodes, &mut found);
    found
}

fn collect_links<'a>(nodes: &'a [Node], found: &mut Vec<&'a Link>) {
    for node in nodes {
        if let Node::Element(e) = node {
            if let Some(link) = e.link_target() {
                found.push(link);
            }
            collect_links(&e.children, found);
        }
    }
}

/// Serialise a node list as HTML.
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(t) => escape_into(t, out),
        Node::Html(h) => out.push_str(h),
        Node::Element(e) => {
            let name = e.tag.html_name();
            out.push('<');
            out.push_str(&name);
            if let Tag::Link(link) = &e.tag {
                write_attr("href", &link.href(), out);
                if matches!(link, Link::External { .. }) {
                    write_attr("target", "_blank", out);
                }
            }
            if let Some(class) = &e.class {
                write_attr("class", class, out);
            }
            for (k, v) in &e.attrs {
                write_attr(k, v, out);
            }
            if !e.styles.is_empty() {
                let style = e
                    .styles
                    .iter()
                    .map(|(k, v)| format!("{}: {}", css_property(k), v))
                    .collect::<Vec<_>>()
                    .join("; ");
                write_attr("style", &style, out);
            }
            out.push('>');
            if e.tag.is_void() {
                return;
            }
            for child in &e.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        }
    }
}

fn write_attr(name: &str, value: &str, out: &mut String) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(value, out);
    out.push('"');
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// `backgroundColor` -> `background-color`.
fn css_property(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
