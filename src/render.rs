//! Text renderer – derives the plain-text part of an email from its markup.
//!
//! Block elements become lines separated by blank lines, `<br>` forces a line
//! break, list items get a marker, and links keep their target in brackets.
//! Shield tokens contain no whitespace, so word wrapping never splits one,
//! and they count as wide as the tag they stand for.

use crate::dom::{decode_entities, parse_html, Document, Element, Node};
use crate::shield::{display_width, map_outside_tokens};

/// Elements that are separated from their surroundings by a blank line.
const PARAGRAPH_ELEMENTS: &[&str] = &[
    "p", "table", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "address", "figure", "form",
    "dl",
];

/// Elements that start on a line of their own.
const LINE_ELEMENTS: &[&str] = &[
    "div", "tr", "td", "th", "center", "section", "article", "header", "footer", "nav", "main",
    "aside", "dt", "dd", "figcaption", "caption", "thead", "tbody", "tfoot",
];

/// Elements whose content never reaches the text part.
const SKIPPED_ELEMENTS: &[&str] = &["head", "style", "script", "title"];

/// Width of an `<hr>` rule when wrapping is off.
const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone)]
pub struct TextOptions {
    /// Render heading text in capitals.
    pub uppercase_headings: bool,
    /// Maximum line width; `0` disables wrapping.
    pub wordwrap: usize,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            uppercase_headings: false,
            wordwrap: 80,
        }
    }
}

/// Render a parsed document as plain text.
pub fn render_text(doc: &Document, options: &TextOptions) -> String {
    let mut writer = TextWriter::new(options);
    writer.walk(&doc.children);
    writer.finish()
}

/// Parse `html` and render it as plain text.
pub fn html_to_text(html: &str, options: &TextOptions) -> String {
    render_text(&parse_html(html), options)
}

/// Separation owed before the next emitted line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Line,
    Blank,
}

enum ListKind {
    Unordered,
    Ordered(usize),
}

struct TextWriter<'a> {
    options: &'a TextOptions,
    out: String,
    /// Collapsed words of the block being built.
    inline: String,
    /// List marker for the first line of the current block.
    marker: Option<String>,
    gap: Gap,
    lists: Vec<ListKind>,
    headings: usize,
}

impl<'a> TextWriter<'a> {
    fn new(options: &'a TextOptions) -> Self {
        Self {
            options,
            out: String::new(),
            inline: String::new(),
            marker: None,
            gap: Gap::None,
            lists: Vec::new(),
            headings: 0,
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.out.trim_end().to_string()
    }

    fn walk(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Text(raw) => self.push_text(raw),
                Node::Element(e) => self.element(e),
                Node::Comment(_) | Node::Raw(_) => {}
            }
        }
    }

    fn element(&mut self, e: &Element) {
        let name = e.name.to_ascii_lowercase();
        let name = name.as_str();
        if SKIPPED_ELEMENTS.contains(&name) {
            return;
        }
        match name {
            "br" => self.line_break(),
            "hr" => {
                self.block(Gap::Blank);
                let width = match self.options.wordwrap {
                    0 => RULE_WIDTH,
                    w => w.min(RULE_WIDTH),
                };
                self.emit(vec!["-".repeat(width)]);
                self.gap = Gap::Blank;
            }
            "img" => {
                if let Some(alt) = e.attr("alt") {
                    self.push_text(alt);
                }
            }
            "a" => self.link(e),
            "ul" | "ol" => {
                let gap = if self.lists.is_empty() { Gap::Blank } else { Gap::Line };
                self.block(gap);
                self.lists.push(if name == "ol" {
                    ListKind::Ordered(0)
                } else {
                    ListKind::Unordered
                });
                self.walk(&e.children);
                self.lists.pop();
                self.block(gap);
            }
            "li" => {
                self.block(Gap::Line);
                self.marker = Some(self.next_marker());
                self.walk(&e.children);
                self.block(Gap::Line);
            }
            "pre" => self.preformatted(e),
            _ if name.len() == 2 && name.starts_with('h') && PARAGRAPH_ELEMENTS.contains(&name) => {
                self.block(Gap::Blank);
                self.headings += 1;
                self.walk(&e.children);
                self.headings -= 1;
                self.block(Gap::Blank);
            }
            _ if PARAGRAPH_ELEMENTS.contains(&name) => {
                self.block(Gap::Blank);
                self.walk(&e.children);
                self.block(Gap::Blank);
            }
            _ if LINE_ELEMENTS.contains(&name) => {
                self.block(Gap::Line);
                self.walk(&e.children);
                self.block(Gap::Line);
            }
            _ => self.walk(&e.children),
        }
    }

    fn link(&mut self, e: &Element) {
        let start = self.inline.len();
        self.walk(&e.children);
        let Some(href) = e.attr("href").map(decode_entities) else {
            return;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return;
        }
        let label = self.inline.get(start..).unwrap_or("").trim();
        if label.is_empty() {
            self.push_words(href);
        } else if label != href {
            self.push_words(&format!(" [{href}]"));
        }
    }

    fn preformatted(&mut self, e: &Element) {
        self.block(Gap::Blank);
        let mut text = String::new();
        raw_text(&e.children, &mut text);
        let text = text.strip_prefix('\n').unwrap_or(&text).trim_end();
        if !text.is_empty() {
            self.emit(text.lines().map(str::to_string).collect());
        }
        self.gap = Gap::Blank;
    }

    fn next_marker(&mut self) -> String {
        let indent = "   ".repeat(self.lists.len().saturating_sub(1));
        match self.lists.last_mut() {
            Some(ListKind::Ordered(n)) => {
                *n += 1;
                format!("{indent} {n}. ")
            }
            _ => format!("{indent} * "),
        }
    }

    fn push_text(&mut self, raw: &str) {
        let text = decode_entities(raw);
        if self.headings > 0 && self.options.uppercase_headings {
            self.push_words(&map_outside_tokens(&text, str::to_uppercase));
        } else {
            self.push_words(&text);
        }
    }

    /// Append text with whitespace runs collapsed to one space.
    fn push_words(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                if !self.inline.is_empty() && !self.inline.ends_with(' ') {
                    self.inline.push(' ');
                }
            } else {
                self.inline.push(c);
            }
        }
    }

    fn line_break(&mut self) {
        if self.inline.trim().is_empty() {
            self.gap = self.gap.max(Gap::Blank);
        } else {
            self.flush();
            self.gap = self.gap.max(Gap::Line);
        }
    }

    /// End the current block and owe at least `gap` before the next one.
    fn block(&mut self, gap: Gap) {
        self.flush();
        self.gap = self.gap.max(gap);
    }

    fn flush(&mut self) {
        let text = std::mem::take(&mut self.inline);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let marker = self.marker.take().unwrap_or_default();
        let lines = wrap(text, &marker, self.options.wordwrap);
        self.emit(lines);
    }

    fn emit(&mut self, lines: Vec<String>) {
        if lines.is_empty() {
            return;
        }
        if !self.out.is_empty() {
            self.out
                .push_str(if self.gap == Gap::Blank { "\n\n" } else { "\n" });
        }
        self.out.push_str(&lines.join("\n"));
        self.gap = Gap::None;
    }
}

fn raw_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(raw) => out.push_str(&decode_entities(raw)),
            Node::Element(e) if e.is("br") => out.push('\n'),
            Node::Element(e) => raw_text(&e.children, out),
            Node::Comment(_) | Node::Raw(_) => {}
        }
    }
}

/// Greedy wrap of space-separated words. The first line starts with `marker`
/// and continuation lines are indented to match it. Words longer than the
/// width get a line of their own.
fn wrap(text: &str, marker: &str, width: usize) -> Vec<String> {
    let indent = " ".repeat(marker.chars().count());
    let mut lines = Vec::new();
    let mut line = marker.to_string();
    let mut line_len = line.chars().count();
    let mut has_words = false;

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let word_len = display_width(word);
        if has_words && width > 0 && line_len + 1 + word_len > width {
            lines.push(std::mem::replace(&mut line, indent.clone()));
            line_len = indent.len();
            has_words = false;
        }
        if has_words {
            line.push(' ');
            line_len += 1;
        }
        line.push_str(word);
        line_len += word_len;
        has_words = true;
    }
    if has_words {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::{shield, unshield};

    fn text(html: &str) -> String {
        html_to_text(html, &TextOptions::default())
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        assert_eq!(
            text("<p>Hello   world</p>\n<p>Second &amp;\n para</p>"),
            "Hello world\n\nSecond & para"
        );
    }

    #[test]
    fn br_breaks_the_line() {
        assert_eq!(text("<p>one<br>two<br/>three</p>"), "one\ntwo\nthree");
    }

    #[test]
    fn lists_get_markers() {
        assert_eq!(
            text("<ul><li>Apples</li><li>Pears</li></ul><ol><li>First</li><li>Second</li></ol>"),
            " * Apples\n * Pears\n\n 1. First\n 2. Second"
        );
    }

    #[test]
    fn nested_lists_are_indented() {
        assert_eq!(
            text("<ul><li>Fruit<ul><li>Apple</li></ul></li><li>Veg</li></ul>"),
            " * Fruit\n    * Apple\n * Veg"
        );
    }

    #[test]
    fn links_keep_their_target() {
        assert_eq!(
            text(
                r##"<p><a href="https://example.com/?a=1&amp;b=2">Visit</a> or <a href="https://x.io">https://x.io</a> <a href="#top">top</a></p>"##
            ),
            "Visit [https://example.com/?a=1&b=2] or https://x.io top"
        );
        assert_eq!(text(r#"<a href="https://x.io"><img src="logo.png"/></a>"#), "https://x.io");
    }

    #[test]
    fn images_and_rules() {
        assert_eq!(
            text(r#"<p><img src="a.png" alt="Logo"/></p><hr/><p>end</p>"#),
            format!("Logo\n\n{}\n\nend", "-".repeat(80))
        );
    }

    #[test]
    fn head_and_style_content_is_dropped() {
        assert_eq!(
            text("<html><head><title>T</title><style>p { color: red; }</style></head><body><p>Body</p></body></html>"),
            "Body"
        );
    }

    #[test]
    fn table_cells_start_new_lines() {
        assert_eq!(
            text("<table><tr><td>Left</td><td>Right</td></tr></table>"),
            "Left\nRight"
        );
    }

    #[test]
    fn preformatted_text_is_kept() {
        assert_eq!(text("<pre>\n  a  b\n c\n</pre><p>x</p>"), "  a  b\n c\n\nx");
    }

    #[test]
    fn wraps_without_splitting_words() {
        let options = TextOptions {
            wordwrap: 10,
            ..TextOptions::default()
        };
        assert_eq!(
            html_to_text("<p>aaa bbb ccc ddddddddddddd e</p>", &options),
            "aaa bbb\nccc\nddddddddddddd\ne"
        );
        let unwrapped = TextOptions {
            wordwrap: 0,
            ..TextOptions::default()
        };
        let long = "word ".repeat(40);
        assert_eq!(
            html_to_text(&format!("<p>{long}</p>"), &unwrapped),
            long.trim_end()
        );
    }

    #[test]
    fn tags_survive_rendering() {
        let options = TextOptions {
            wordwrap: 12,
            ..TextOptions::default()
        };
        let html = shield(r#"<p>Hello <%= user.name %>, see <a href="<%= url %>">this</a></p>"#);
        let out = unshield(&html_to_text(&html, &options));
        assert!(out.contains("<%= user.name %>"), "{out}");
        assert!(out.contains("[<%= url %>]"), "{out}");
    }

    #[test]
    fn tags_are_measured_as_written_when_wrapping() {
        let source = format!("{}<%= a %> tail", "word ".repeat(14));
        let out = unshield(&html_to_text(&shield(&format!("<p>{source}</p>")), &TextOptions::default()));
        assert_eq!(out, format!("{}<%= a %>\ntail", "word ".repeat(14)));
    }

    #[test]
    fn uppercase_headings_leave_tags_alone() {
        let options = TextOptions {
            uppercase_headings: true,
            ..TextOptions::default()
        };
        let html = shield("<h1>Hi <%= user.name %></h1><p>body</p>");
        assert_eq!(
            unshield(&html_to_text(&html, &options)),
            "HI <%= user.name %>\n\nbody"
        );
    }
}
