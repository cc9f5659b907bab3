//! Style inliner – moves stylesheet declarations into `style` attributes.
//!
//! For every element, matching rules are applied in ascending specificity
//! then source order, followed by the element's own `style` attribute.
//! `!important` declarations are never overridden by non-important ones.

use crate::css::{cascade_order, parse_declarations, Declaration, Rule, Scope, Stylesheet};
use crate::dom::{decode_entities, escape_attr, parse_html, Document, Element, Node};

/// Elements that are never rendered and never receive styles.
const UNSTYLED_ELEMENTS: &[&str] = &["head", "title", "meta", "link", "style", "script", "base"];

/// Elements that take presentational attributes.
const TABLE_ELEMENTS: &[&str] = &[
    "table", "td", "th", "tr", "caption", "colgroup", "col", "thead", "tbody", "tfoot",
];

/// Elements that get `width`/`height` attributes from their style.
const DIMENSION_ELEMENTS: &[&str] = &["table", "td", "th", "img"];

/// CSS property → HTML attribute for table elements.
const STYLE_TO_ATTRIBUTE: &[(&str, &str)] = &[
    ("background-color", "bgcolor"),
    ("background-image", "background"),
    ("text-align", "align"),
    ("vertical-align", "valign"),
];

#[derive(Debug, Clone)]
pub struct InlineOptions {
    /// Keep `!important` in the inlined declarations.
    pub preserve_important: bool,
    /// Drop `<style>` elements (except `data-embed` ones) after inlining.
    pub remove_style_tags: bool,
    /// Re-emit `@media` and `@font-face` blocks in a single `<style>` element
    /// in `<head>`.
    pub preserve_media_queries: bool,
    /// Mirror colours and alignment onto table element attributes.
    pub apply_table_attributes: bool,
    pub apply_width_attributes: bool,
    pub apply_height_attributes: bool,
}

impl Default for InlineOptions {
    fn default() -> Self {
        Self {
            preserve_important: true,
            remove_style_tags: true,
            preserve_media_queries: true,
            apply_table_attributes: true,
            apply_width_attributes: true,
            apply_height_attributes: true,
        }
    }
}

/// Inline `css` into `html` and serialize the result.
pub fn inline_html(html: &str, css: &str, options: &InlineOptions) -> String {
    let mut doc = parse_html(html);
    inline_document(&mut doc, css, options);
    doc.to_html()
}

/// Inline `css` into a parsed document in place.
pub fn inline_document(doc: &mut Document, css: &str, options: &InlineOptions) {
    let sheet = Stylesheet::parse(css);
    for selector in &sheet.skipped_selectors {
        log::debug!("selector not inlinable: {selector}");
    }
    let mut rules = sheet.rules;
    rules.sort_by(cascade_order);

    // Match against an immutable tree first, then write in the same order.
    let mut computed = Vec::new();
    let mut path = Vec::new();
    compute_styles(&doc.children, &mut path, &rules, &mut computed);
    let mut next = 0;
    apply_styles(&mut doc.children, &computed, &mut next, options);

    if options.remove_style_tags {
        doc.retain_elements(&|e| !e.is("style") || e.has_attr("data-embed"));
    }
    if options.preserve_media_queries && !sheet.preserved_at_rules.is_empty() {
        insert_preserved_rules(doc, &sheet.preserved_at_rules);
    }
}

/// One entry per element in document order: the merged declarations, or
/// `None` when no rule matched.
fn compute_styles<'a>(
    nodes: &'a [Node],
    path: &mut Vec<Scope<'a>>,
    rules: &[Rule],
    out: &mut Vec<Option<Vec<Declaration>>>,
) {
    let mut preceding: Vec<&'a Element> = Vec::new();
    for node in nodes {
        let Node::Element(e) = node else {
            continue;
        };
        path.push(Scope {
            element: e,
            preceding: preceding.clone(),
        });

        let styled = !UNSTYLED_ELEMENTS.iter().any(|n| e.is(n));
        let matched: Vec<&Rule> = if styled {
            rules.iter().filter(|r| r.selector.matches(path)).collect()
        } else {
            Vec::new()
        };
        out.push((!matched.is_empty()).then(|| merge(&matched, e)));

        compute_styles(&e.children, path, rules, out);
        path.pop();
        preceding.push(e);
    }
}

fn merge(matched: &[&Rule], e: &Element) -> Vec<Declaration> {
    let mut merged: Vec<Declaration> = Vec::new();
    for rule in matched {
        for decl in &rule.declarations {
            upsert(&mut merged, decl);
        }
    }
    if let Some(own) = e.attr("style") {
        for decl in &parse_declarations(&decode_entities(own)) {
            upsert(&mut merged, decl);
        }
    }
    merged
}

fn upsert(merged: &mut Vec<Declaration>, decl: &Declaration) {
    match merged.iter_mut().find(|d| d.property == decl.property) {
        Some(existing) if existing.important && !decl.important => {}
        Some(existing) => *existing = decl.clone(),
        None => merged.push(decl.clone()),
    }
}

fn apply_styles(
    nodes: &mut [Node],
    computed: &[Option<Vec<Declaration>>],
    next: &mut usize,
    options: &InlineOptions,
) {
    for node in nodes.iter_mut() {
        let Node::Element(e) = node else {
            continue;
        };
        if let Some(Some(decls)) = computed.get(*next) {
            write_style(e, decls, options);
        }
        *next += 1;
        apply_styles(&mut e.children, computed, next, options);
    }
}

fn write_style(e: &mut Element, decls: &[Declaration], options: &InlineOptions) {
    let style = decls
        .iter()
        .map(|d| format!("{};", d.to_css(options.preserve_important)))
        .collect::<Vec<_>>()
        .join(" ");
    e.set_attr("style", escape_attr(&style));

    if options.apply_table_attributes && TABLE_ELEMENTS.iter().any(|n| e.is(n)) {
        for (property, attribute) in STYLE_TO_ATTRIBUTE {
            if let Some(d) = find(decls, property) {
                let value = if *property == "background-image" {
                    unwrap_url(&d.value)
                } else {
                    d.value.as_str()
                };
                set_if_absent(e, attribute, value);
            }
        }
    }
    if DIMENSION_ELEMENTS.iter().any(|n| e.is(n)) {
        for (enabled, dimension) in [
            (options.apply_width_attributes, "width"),
            (options.apply_height_attributes, "height"),
        ] {
            if !enabled {
                continue;
            }
            if let Some(value) = find(decls, dimension).and_then(|d| dimension_attribute(&d.value)) {
                set_if_absent(e, dimension, &value);
            }
        }
    }
}

fn find<'d>(decls: &'d [Declaration], property: &str) -> Option<&'d Declaration> {
    decls.iter().find(|d| d.property == property)
}

fn set_if_absent(e: &mut Element, attribute: &str, value: &str) {
    if !e.has_attr(attribute) {
        e.set_attr(attribute, escape_attr(value));
    }
}

/// `url("a.png")` → `a.png`.
fn unwrap_url(value: &str) -> &str {
    value
        .trim()
        .strip_prefix("url(")
        .and_then(|v| v.strip_suffix(')'))
        .map(|v| v.trim().trim_matches(|c: char| c == '"' || c == '\''))
        .unwrap_or(value)
}

/// `580px` → `580`, `32.5px` → `32`, `100%` → `100%`; anything else is not
/// expressible as an attribute.
fn dimension_attribute(value: &str) -> Option<String> {
    let value = value.trim();
    if let Some(px) = value.strip_suffix("px") {
        let whole = px.split('.').next().unwrap_or(px);
        return whole.parse::<u32>().ok().map(|n| n.to_string());
    }
    if let Some(pct) = value.strip_suffix('%') {
        return pct.parse::<f32>().ok().map(|_| value.to_string());
    }
    None
}

fn insert_preserved_rules(doc: &mut Document, at_rules: &[String]) {
    let style = Node::Element(
        Element::new("style").with_children(vec![Node::Text(format!(
            "\n{}\n",
            at_rules.join("\n")
        ))]),
    );
    match doc.find_mut(&|e| e.is("head")) {
        Some(head) => head.children.push(style),
        None => doc.children.insert(0, style),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(html: &str, css: &str) -> String {
        inline_html(html, css, &InlineOptions::default())
    }

    #[test]
    fn rules_become_style_attributes() {
        assert_eq!(
            inline("<p class=\"lead\">x</p><p>y</p>", "p { color: red } .lead { font-size: 20px }"),
            "<p class=\"lead\" style=\"color: red; font-size: 20px;\">x</p><p style=\"color: red;\">y</p>"
        );
    }

    #[test]
    fn specificity_beats_source_order() {
        assert_eq!(
            inline("<p id=\"a\" class=\"b\">x</p>", "#a { color: red } .b { color: blue } p { color: green }"),
            "<p id=\"a\" class=\"b\" style=\"color: red;\">x</p>"
        );
    }

    #[test]
    fn own_style_wins_unless_sheet_is_important() {
        assert_eq!(
            inline(
                "<p style=\"color: blue; margin: 0\">x</p>",
                "p { color: red; margin: 5px !important; padding: 1px }"
            ),
            "<p style=\"color: blue; margin: 5px !important; padding: 1px;\">x</p>"
        );
    }

    #[test]
    fn important_can_be_dropped() {
        let options = InlineOptions {
            preserve_important: false,
            ..InlineOptions::default()
        };
        assert_eq!(
            inline_html("<p>x</p>", "p { color: red !important }", &options),
            "<p style=\"color: red;\">x</p>"
        );
    }

    #[test]
    fn style_tags_are_removed_except_embedded() {
        let html = "<html><head><style>p { color: red }</style><style data-embed>a:hover { color: blue }</style></head><body><p>x</p></body></html>";
        let out = inline(html, "p { color: red }");
        assert_eq!(
            out,
            "<html><head><style data-embed>a:hover { color: blue }</style></head><body><p style=\"color: red;\">x</p></body></html>"
        );
    }

    #[test]
    fn head_elements_are_not_styled() {
        let out = inline("<head><title>t</title></head><div>x</div>", "* { margin: 0 }");
        assert_eq!(out, "<head><title>t</title></head><div style=\"margin: 0;\">x</div>");
    }

    #[test]
    fn table_elements_get_presentational_attributes() {
        let out = inline(
            "<table class=\"container\" align=\"center\"><tr><td>x</td></tr></table><img src=\"a.png\"/>",
            "table.container { width: 580px; text-align: left; background-color: #fefefe } td { width: 50%; vertical-align: top } img { width: auto; height: 32.5px }",
        );
        assert_eq!(
            out,
            "<table class=\"container\" align=\"center\" style=\"width: 580px; text-align: left; background-color: #fefefe;\" bgcolor=\"#fefefe\" width=\"580\">\
             <tr><td style=\"width: 50%; vertical-align: top;\" valign=\"top\" width=\"50%\">x</td></tr></table>\
             <img src=\"a.png\" style=\"width: auto; height: 32.5px;\" height=\"32\"/>"
        );
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let out = inline("<p>x</p>", "p { font-family: \"Open Sans\", sans-serif }");
        assert_eq!(out, "<p style=\"font-family: &quot;Open Sans&quot;, sans-serif;\">x</p>");
        let again = inline(&out, "p { color: red }");
        assert_eq!(
            again,
            "<p style=\"color: red; font-family: &quot;Open Sans&quot;, sans-serif;\">x</p>"
        );
    }

    #[test]
    fn media_queries_and_font_faces_are_kept_in_head() {
        let out = inline(
            "<html><head></head><body><p>x</p></body></html>",
            "@font-face { font-family: Brand; src: url(brand.woff2) } p { color: red } \
             @media only screen and (max-width: 596px) { p { color: blue } }",
        );
        assert_eq!(
            out,
            "<html><head><style>\n@font-face { font-family: Brand; src: url(brand.woff2) }\n\
             @media only screen and (max-width: 596px) { p { color: blue } }\n</style></head>\
             <body><p style=\"color: red;\">x</p></body></html>"
        );
    }

    #[test]
    fn media_queries_can_be_dropped() {
        let options = InlineOptions {
            preserve_media_queries: false,
            ..InlineOptions::default()
        };
        let out = inline_html(
            "<p>x</p>",
            "p { color: red } @media print { p { color: black } }",
            &options,
        );
        assert_eq!(out, "<p style=\"color: red;\">x</p>");
    }

    #[test]
    fn outlook_capitalised_properties_stay_distinct() {
        let out = inline("<p>x</p>", "p { margin: 0; Margin: 0 }");
        assert_eq!(out, "<p style=\"margin: 0; Margin: 0;\">x</p>");
    }
}
