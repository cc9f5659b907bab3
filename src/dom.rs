//! HTML parser – converts an email template into a simple DOM tree and back.
//!
//! The parser works in a lenient XML mode:
//! - no implicit closing by tag name: an element ends at its own closing
//!   tag, at the closing tag of an enclosing element, or at the end of
//!   input, so content never moves relative to the surrounding markup
//! - HTML void elements (`br`, `img`, `meta`, ...) never take children
//! - `<style>` and `<script>` bodies are raw text
//! - text and attribute values are kept exactly as written (entities are
//!   not decoded), comments, doctypes and CDATA sections are kept verbatim
//!
//! Unbalanced markup is common in templates (optional end tags, one start
//! tag per branch of a conditional) and is kept as written. Serializing an
//! untouched tree gives back the input, modulo void elements which are
//! written self-closed.

use thiserror::Error;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// Elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose body is raw text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script"];

/// A node in the DOM tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Raw source text, entities still encoded.
    Text(String),
    /// Comment body without the `<!--`/`-->` markers.
    Comment(String),
    /// Doctype, processing instruction or CDATA section, verbatim.
    Raw(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }
}

/// A single attribute. `value` is the raw source text between the quotes;
/// `None` for a bare attribute such as `nowrap`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

/// An element node carrying name, ordered attributes, and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Written as `<name/>` in the source.
    pub self_closing: bool,
    /// Has no closing tag in the source and is serialized without one.
    pub unclosed: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
            unclosed: false,
        }
    }

    /// Builder form of [`Element::set_attr`].
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_void(&self) -> bool {
        is_void(&self.name)
    }

    /// Raw attribute value; a bare attribute reads as `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Set an attribute to an already-escaped value, keeping its position if
    /// it exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = Some(value.into());
        match self
            .attributes
            .iter_mut()
            .find(|a| a.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<Attribute> {
        let idx = self
            .attributes
            .iter()
            .position(|a| a.name.eq_ignore_ascii_case(name))?;
        Some(self.attributes.remove(idx))
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().contains(&class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", joined);
    }

    /// Element children only.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Whether any descendant satisfies `pred`.
    pub fn any_descendant(&self, pred: &dyn Fn(&Element) -> bool) -> bool {
        self.child_elements()
            .any(|c| pred(c) || c.any_descendant(pred))
    }
}

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// A parsed document: the top-level node list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Document {
    /// Serialize back to markup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(&mut out, node);
        }
        out
    }

    /// Drop every element (and its subtree) for which `keep` is false.
    pub fn retain_elements(&mut self, keep: &dyn Fn(&Element) -> bool) {
        retain_in(&mut self.children, keep);
    }

    /// Find the first element satisfying `pred`, depth first.
    pub fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        find_in(&mut self.children, pred)
    }
}

fn retain_in(nodes: &mut Vec<Node>, keep: &dyn Fn(&Element) -> bool) {
    nodes.retain(|n| n.as_element().map_or(true, keep));
    for node in nodes.iter_mut() {
        if let Node::Element(e) = node {
            retain_in(&mut e.children, keep);
        }
    }
}

fn find_in<'a>(nodes: &'a mut [Node], pred: &dyn Fn(&Element) -> bool) -> Option<&'a mut Element> {
    for node in nodes.iter_mut() {
        if let Node::Element(e) = node {
            if pred(e) {
                return Some(e);
            }
            if let Some(found) = find_in(&mut e.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Grid shorthand that cannot be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("{0}")]
    Structure(String),
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over the source text
// ---------------------------------------------------------------------------

/// Parse a template into a [`Document`].
///
/// Parsing never fails. A closing tag ends every element opened inside the
/// element it names; one naming no open element is dropped. Elements still
/// open at the end of input, and constructs cut off by it, are kept without
/// inventing any markup.
pub fn parse_html(html: &str) -> Document {
    let mut parser = Parser::new(html);
    Document {
        children: parser.parse_nodes(),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Names of the elements currently open, outermost first.
    open: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            open: Vec::new(),
        }
    }

    /// Parse siblings until EOF or a closing tag of an open element.
    fn parse_nodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        while !self.eof() {
            if self.starts_with("</") {
                let save = self.pos;
                self.advance(2);
                let name = self.parse_name();
                if name.is_empty() {
                    self.pos = save;
                    nodes.push(self.parse_text());
                    continue;
                }
                if self.is_open(&name) {
                    self.pos = save;
                    break;
                }
                self.skip_past('>');
                log::debug!("dropping </{name}>: no open element of that name");
                continue;
            }
            nodes.push(self.parse_node());
        }
        nodes
    }

    fn is_open(&self, name: &str) -> bool {
        self.open.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn parse_node(&mut self) -> Node {
        if self.starts_with("<!--") {
            return self.parse_comment();
        }
        if self.starts_with("<![CDATA[") {
            return self.parse_until_raw("]]>");
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            return self.parse_until_raw(">");
        }
        if self.at_tag_open() {
            let start = self.pos;
            return match self.parse_element() {
                Some(elem) => Node::Element(elem),
                None => {
                    // Start tag cut off by the end of input.
                    self.pos = self.input.len();
                    Node::Text(self.input[start..].to_string())
                }
            };
        }
        self.parse_text()
    }

    fn at_tag_open(&self) -> bool {
        let mut chars = self.input[self.pos..].chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) -> Node {
        let start = self.pos;
        // Always consume at least one char so a lone '<' becomes text.
        self.advance(1);
        while !self.eof() && !self.markup_starts_here() {
            self.advance(1);
        }
        Node::Text(self.input[start..self.pos].to_string())
    }

    fn markup_starts_here(&self) -> bool {
        self.at_tag_open() || self.starts_with("</") || self.starts_with("<!") || self.starts_with("<?")
    }

    fn parse_comment(&mut self) -> Node {
        let body_start = self.pos + 4; // <!--
        match self.input[body_start..].find("-->") {
            Some(len) => {
                self.pos = body_start + len + 3;
                Node::Comment(self.input[body_start..body_start + len].to_string())
            }
            None => self.rest_as_raw(),
        }
    }

    fn parse_until_raw(&mut self, terminator: &str) -> Node {
        let start = self.pos;
        match self.input[self.pos..].find(terminator) {
            Some(len) => {
                self.pos += len + terminator.len();
                Node::Raw(self.input[start..self.pos].to_string())
            }
            None => self.rest_as_raw(),
        }
    }

    fn rest_as_raw(&mut self) -> Node {
        let start = self.pos;
        self.pos = self.input.len();
        Node::Raw(self.input[start..].to_string())
    }

    /// `None` when the start tag runs into the end of input.
    fn parse_element(&mut self) -> Option<Element> {
        self.advance(1); // <
        let name = self.parse_name();
        let mut elem = Element::new(name);

        // Attributes
        loop {
            self.skip_whitespace();
            if self.eof() {
                return None;
            }
            if self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            if let Some(attr) = self.parse_attribute() {
                elem.attributes.push(attr);
            }
        }

        if self.starts_with("/>") {
            self.advance(2);
            elem.self_closing = true;
            return Some(elem);
        }
        self.advance(1); // >
        if elem.is_void() {
            return Some(elem);
        }

        if is_raw_text(&elem.name) {
            let close = format!("</{}", elem.name.to_ascii_lowercase());
            let rest = self.input[self.pos..].to_ascii_lowercase();
            let len = rest.find(&close).unwrap_or(rest.len());
            if len > 0 {
                elem.children
                    .push(Node::Text(self.input[self.pos..self.pos + len].to_string()));
            }
            self.pos += len;
        } else {
            self.open.push(elem.name.clone());
            elem.children = self.parse_nodes();
            self.open.pop();
        }

        // Closing tag. Anything else ends the element implicitly: the end of
        // input, or the closing tag of an enclosing element.
        let save = self.pos;
        if self.starts_with("</") {
            self.advance(2);
            if self.parse_name().eq_ignore_ascii_case(&elem.name) {
                self.skip_past('>');
                return Some(elem);
            }
        }
        self.pos = save;
        elem.unclosed = true;
        Some(elem)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.') {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> Option<Attribute> {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || matches!(c, '=' | '>' | '"' | '\'') || self.starts_with("/>") {
                break;
            }
            self.advance(1);
        }
        if self.pos == start {
            // Stray quote or '=' – skip it rather than loop forever.
            self.advance(1);
            return None;
        }
        let name = self.input[start..self.pos].to_string();
        let save = self.pos;
        self.skip_whitespace();
        if !self.starts_with("=") {
            self.pos = save;
            return Some(Attribute { name, value: None });
        }
        self.advance(1); // =
        self.skip_whitespace();
        Some(Attribute {
            name,
            value: Some(self.parse_attr_value()),
        })
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ['"', '\''] {
            if self.current_char_is(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.current_char_is(quote) {
                    self.advance(1);
                }
                let value = self.input[start..self.pos].to_string();
                if !self.eof() {
                    self.advance(1);
                }
                return value;
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' || self.starts_with("/>") {
                break;
            }
            self.advance(1);
        }
        self.input[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn skip_past(&mut self, c: char) {
        while !self.eof() && !self.current_char_is(c) {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(1);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn current_char_is(&self, c: char) -> bool {
        !self.eof() && self.current_char() == c
    }

    fn advance(&mut self, n: usize) {
        // Advance by `n` characters (not bytes).
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

fn write_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(t) | Node::Raw(t) => out.push_str(t),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::Element(e) => write_element(out, e),
    }
}

fn write_element(out: &mut String, e: &Element) {
    out.push('<');
    out.push_str(&e.name);
    for attr in &e.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        if let Some(value) = &attr.value {
            out.push_str("=\"");
            // Values from single-quoted source may hold a double quote.
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }
    if e.children.is_empty() && (e.self_closing || e.is_void()) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &e.children {
        write_node(out, child);
    }
    if !e.unclosed {
        out.push_str("</");
        out.push_str(&e.name);
        out.push('>');
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Decode the character references that occur in email markup.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "bull" => '\u{2022}',
        "middot" => '\u{00B7}',
        "zwnj" => '\u{200C}',
        "euro" => '\u{20AC}',
        _ => return None,
    })
}

/// Escape plain text for use inside a double-quoted attribute value.
pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}
