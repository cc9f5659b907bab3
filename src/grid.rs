//! Grid expander – rewrites Foundation for Emails ("Inky") shorthand into
//! the table markup email clients understand.
//!
//! `<container>`, `<row>` and `<columns>` become the nested tables of the
//! 12-column grid; `<button>`, `<callout>`, `<spacer>`, `<wrapper>`,
//! `<center>`, `<menu>`/`<item>`, `<block-grid>` and `<h-line>` expand to
//! their component markup. Everything else is left alone.

use crate::dom::{Attribute, Document, Element, MarkupError, Node};

/// Columns in the grid.
pub const COLUMN_COUNT: u32 = 12;

/// Attributes consumed by the components and never copied to the output.
const IGNORED_ATTRIBUTES: &[&str] = &[
    "class", "id", "href", "size", "size-sm", "size-lg", "large", "no-expander", "small", "target",
];

/// Expand all shorthand in place.
pub fn expand_grid(doc: &mut Document) -> Result<(), MarkupError> {
    let nodes = std::mem::take(&mut doc.children);
    doc.children = expand_nodes(nodes, Context::default())?;
    Ok(())
}

/// Where a node list sits.
#[derive(Debug, Clone, Copy, Default)]
struct Context {
    /// Direct children of a `<row>`.
    in_row: bool,
    /// Anywhere below a `<menu>`.
    in_menu: bool,
}

/// Position of an element among its element siblings.
struct Siblings {
    count: usize,
    prev_is_columns: bool,
    next_is_columns: bool,
}

fn expand_nodes(nodes: Vec<Node>, ctx: Context) -> Result<Vec<Node>, MarkupError> {
    let is_columns: Vec<bool> = nodes
        .iter()
        .filter_map(Node::as_element)
        .map(|e| e.is("columns"))
        .collect();
    let count = is_columns.len();

    let mut out = Vec::with_capacity(nodes.len());
    let mut k = 0;
    for node in nodes {
        match node {
            Node::Element(e) => {
                let siblings = Siblings {
                    count,
                    prev_is_columns: k > 0 && is_columns[k - 1],
                    next_is_columns: k + 1 < count && is_columns[k + 1],
                };
                k += 1;
                out.extend(expand_element(e, ctx, &siblings)?);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn expand_element(e: Element, ctx: Context, siblings: &Siblings) -> Result<Vec<Node>, MarkupError> {
    let name = e.name.to_ascii_lowercase();
    let inner_ctx = Context {
        in_row: name == "row",
        in_menu: ctx.in_menu || name == "menu",
    };

    let expanded = match name.as_str() {
        "container" => container(e, inner_ctx)?,
        "row" => row(e, inner_ctx)?,
        "columns" => {
            if !ctx.in_row {
                return Err(MarkupError::Structure(
                    "<columns> must be a direct child of <row>".to_string(),
                ));
            }
            columns(e, inner_ctx, siblings)?
        }
        "button" => button(e, inner_ctx)?,
        "callout" => callout(e, inner_ctx)?,
        "spacer" => return spacer(&e),
        "wrapper" => wrapper(e, inner_ctx)?,
        "center" => center(e, inner_ctx)?,
        "menu" => menu(e, inner_ctx)?,
        "item" => {
            if !ctx.in_menu {
                return Err(MarkupError::Structure("<item> must be inside <menu>".to_string()));
            }
            item(e, inner_ctx)?
        }
        "block-grid" => block_grid(e, inner_ctx)?,
        "h-line" => h_line(&e),
        _ => {
            let mut e = e;
            let children = std::mem::take(&mut e.children);
            e.children = expand_nodes(children, inner_ctx)?;
            Node::Element(e)
        }
    };
    Ok(vec![expanded])
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

fn container(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let class = class_list("container", &e);
    let attrs = passthrough(&e);
    let inner = expand_nodes(e.children, ctx)?;
    Ok(table(attrs, &[("align", "center"), ("class", class.as_str())], vec![tbody(vec![tr(vec![
        td(&[], inner),
    ])])]))
}

fn row(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let class = class_list("row", &e);
    let attrs = passthrough(&e);
    let inner = expand_nodes(e.children, ctx)?;
    Ok(table(attrs, &[("class", class.as_str())], vec![tbody(vec![tr(inner)])]))
}

fn columns(e: Element, ctx: Context, siblings: &Siblings) -> Result<Node, MarkupError> {
    let small = column_size(&e, "small")?.unwrap_or(COLUMN_COUNT);
    let large = match column_size(&e, "large")? {
        Some(large) => large,
        None => column_size(&e, "small")?
            .unwrap_or((COLUMN_COUNT / siblings.count.max(1) as u32).max(1)),
    };
    let has_nested_row = e.any_descendant(&|d| d.is("row") || d.has_class("row"));
    let no_expander = e.attr("no-expander").is_some_and(|v| v != "false");

    let mut classes: Vec<String> = e.classes().iter().map(|c| c.to_string()).collect();
    classes.push(format!("small-{small}"));
    classes.push(format!("large-{large}"));
    classes.push("columns".to_string());
    if !siblings.prev_is_columns {
        classes.push("first".to_string());
    }
    if !siblings.next_is_columns {
        classes.push("last".to_string());
    }

    let attrs = passthrough(&e);
    let inner = expand_nodes(e.children, ctx)?;
    let mut cells = vec![element("th", Vec::new(), &[], inner)];
    if large == COLUMN_COUNT && !has_nested_row && !no_expander {
        cells.push(Node::Text("\n".to_string()));
        cells.push(element("th", Vec::new(), &[("class", "expander")], Vec::new()));
    }

    let mut outer = Element::new("th").with_attr("class", classes.join(" "));
    outer.attributes.extend(attrs);
    Ok(Node::Element(outer.with_children(vec![table(
        Vec::new(),
        &[],
        vec![tbody(vec![tr(cells)])],
    )])))
}

fn button(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let class = class_list("button", &e);
    let expanded = e.has_class("expand") || e.has_class("expanded");
    let attrs = passthrough(&e);
    let href = e.attr("href").map(str::to_string);
    let target = e.attr("target").map(str::to_string);
    let mut inner = expand_nodes(e.children, ctx)?;

    if let Some(href) = href {
        let mut link = Element::new("a");
        link.attributes.extend(attrs);
        link.set_attr("href", href);
        if let Some(target) = target {
            link.set_attr("target", target);
        }
        inner = vec![Node::Element(link.with_children(inner))];
    }

    let mut cells = Vec::new();
    if expanded {
        inner = vec![element("center", Vec::new(), &[], inner)];
    }
    cells.push(td(&[], vec![table(Vec::new(), &[], vec![tbody(vec![tr(vec![td(&[], inner)])])])]));
    if expanded {
        cells.push(Node::Text("\n".to_string()));
        cells.push(td(&[("class", "expander")], Vec::new()));
    }
    Ok(table(Vec::new(), &[("class", class.as_str())], vec![tbody(vec![tr(cells)])]))
}

fn callout(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let inner_class = class_list("callout-inner", &e);
    let attrs = passthrough(&e);
    let inner = expand_nodes(e.children, ctx)?;
    Ok(table(attrs, &[("class", "callout")], vec![tbody(vec![tr(vec![
        element("th", Vec::new(), &[("class", inner_class.as_str())], inner),
        element("th", Vec::new(), &[("class", "expander")], Vec::new()),
    ])])]))
}

fn spacer(e: &Element) -> Result<Vec<Node>, MarkupError> {
    let build = |size: u32, visibility: Option<&str>| {
        let class = match visibility {
            Some(v) => class_list(&format!("spacer {v}"), e),
            None => class_list("spacer", e),
        };
        let height = size.to_string();
        let style = format!("font-size:{size}px;line-height:{size}px;");
        let cell = element(
            "td",
            Vec::new(),
            &[("height", height.as_str()), ("style", style.as_str())],
            vec![Node::Text("&#xA0;".to_string())],
        );
        table(passthrough(e), &[("class", class.as_str())], vec![tbody(vec![tr(vec![cell])])])
    };

    let small = spacer_size(e, "size-sm")?;
    let large = spacer_size(e, "size-lg")?;
    if small.is_none() && large.is_none() {
        let size = spacer_size(e, "size")?.unwrap_or(16);
        return Ok(vec![build(size, None)]);
    }
    let mut out = Vec::new();
    if let Some(size) = small {
        out.push(build(size, Some("hide-for-large")));
    }
    if let Some(size) = large {
        out.push(build(size, Some("show-for-large")));
    }
    Ok(out)
}

fn wrapper(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let class = class_list("wrapper", &e);
    let attrs = passthrough(&e);
    let inner = expand_nodes(e.children, ctx)?;
    Ok(table(attrs, &[("class", class.as_str()), ("align", "center")], vec![tbody(vec![tr(vec![
        td(&[("class", "wrapper-inner")], inner),
    ])])]))
}

fn center(mut e: Element, ctx: Context) -> Result<Node, MarkupError> {
    for child in e.children.iter_mut().filter_map(Node::as_element_mut) {
        child.set_attr("align", "center");
        child.add_class("float-center");
    }
    mark_menu_items(&mut e.children);
    let children = std::mem::take(&mut e.children);
    e.children = expand_nodes(children, ctx)?;
    Ok(Node::Element(e))
}

fn mark_menu_items(nodes: &mut [Node]) {
    for e in nodes.iter_mut().filter_map(Node::as_element_mut) {
        if e.is("item") || e.has_class("menu-item") {
            e.add_class("float-center");
        }
        mark_menu_items(&mut e.children);
    }
}

fn menu(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let class = class_list("menu", &e);
    let attrs = passthrough(&e);
    let inner = expand_nodes(e.children, ctx)?;
    Ok(table(attrs, &[("class", class.as_str())], vec![tbody(vec![tr(vec![td(
        &[],
        vec![table(Vec::new(), &[], vec![tbody(vec![tr(inner)])])],
    )])])]))
}

fn item(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let class = class_list("menu-item", &e);
    let attrs = passthrough(&e);
    let mut link = Element::new("a").with_attr("href", e.attr("href").unwrap_or(""));
    if let Some(target) = e.attr("target") {
        link.set_attr("target", target);
    }
    let inner = expand_nodes(e.children, ctx)?;
    Ok(element(
        "th",
        attrs,
        &[("class", class.as_str())],
        vec![Node::Element(link.with_children(inner))],
    ))
}

fn block_grid(e: Element, ctx: Context) -> Result<Node, MarkupError> {
    let up = e
        .attr("up")
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| MarkupError::Structure("<block-grid> needs a numeric `up`".to_string()))?;
    let class = class_list(&format!("block-grid up-{up}"), &e);
    let inner = expand_nodes(e.children, ctx)?;
    Ok(table(Vec::new(), &[("class", class.as_str())], vec![tbody(vec![tr(inner)])]))
}

fn h_line(e: &Element) -> Node {
    let class = class_list("h-line", e);
    table(Vec::new(), &[("class", class.as_str())], vec![tr(vec![element(
        "th",
        Vec::new(),
        &[],
        vec![Node::Text("&nbsp;".to_string())],
    )])])
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `base` followed by the element's own classes.
fn class_list(base: &str, e: &Element) -> String {
    std::iter::once(base)
        .chain(e.classes())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Attributes that are copied onto the generated outer element.
fn passthrough(e: &Element) -> Vec<Attribute> {
    e.attributes
        .iter()
        .filter(|a| {
            !IGNORED_ATTRIBUTES
                .iter()
                .any(|ignored| a.name.eq_ignore_ascii_case(ignored))
        })
        .cloned()
        .collect()
}

fn column_size(e: &Element, attr: &str) -> Result<Option<u32>, MarkupError> {
    let Some(raw) = e.attr(attr) else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(n) if (1..=COLUMN_COUNT).contains(&n) => Ok(Some(n)),
        _ => Err(MarkupError::Structure(format!(
            "<columns {attr}=\"{raw}\"> is not a column count between 1 and {COLUMN_COUNT}"
        ))),
    }
}

fn spacer_size(e: &Element, attr: &str) -> Result<Option<u32>, MarkupError> {
    let Some(raw) = e.attr(attr) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| MarkupError::Structure(format!("<spacer {attr}=\"{raw}\"> is not a pixel size")))
}

/// Build an element from carried-over attributes followed by new ones.
/// Values are written as given and must already be escaped.
fn element(name: &str, carried: Vec<Attribute>, attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
    let mut e = Element::new(name);
    e.attributes = carried;
    for (key, value) in attrs {
        e.set_attr(key, *value);
    }
    Node::Element(e.with_children(children))
}

fn table(carried: Vec<Attribute>, attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
    element("table", carried, attrs, children)
}

fn tbody(children: Vec<Node>) -> Node {
    element("tbody", Vec::new(), &[], children)
}

fn tr(children: Vec<Node>) -> Node {
    element("tr", Vec::new(), &[], children)
}

fn td(attrs: &[(&str, &str)], children: Vec<Node>) -> Node {
    element("td", Vec::new(), attrs, children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn expand(html: &str) -> String {
        let mut doc = parse_html(html);
        expand_grid(&mut doc).unwrap();
        doc.to_html()
    }

    fn expand_err(html: &str) -> MarkupError {
        let mut doc = parse_html(html);
        expand_grid(&mut doc).unwrap_err()
    }

    #[test]
    fn container_and_row() {
        assert_eq!(
            expand("<container class=\"body\"><row>x</row></container>"),
            "<table align=\"center\" class=\"container body\"><tbody><tr><td>\
             <table class=\"row\"><tbody><tr>x</tr></tbody></table>\
             </td></tr></tbody></table>"
        );
    }

    #[test]
    fn full_width_column_gets_an_expander() {
        assert_eq!(
            expand("<row><columns>Hi</columns></row>"),
            "<table class=\"row\"><tbody><tr>\
             <th class=\"small-12 large-12 columns first last\"><table><tbody><tr><th>Hi</th>\n\
             <th class=\"expander\"></th></tr></tbody></table></th>\
             </tr></tbody></table>"
        );
    }

    #[test]
    fn columns_split_evenly_and_mark_first_and_last() {
        let out = expand("<row><columns>a</columns><columns small=\"6\">b</columns><columns large=\"3\">c</columns></row>");
        assert!(out.contains("<th class=\"small-12 large-4 columns first\">"), "{out}");
        assert!(out.contains("<th class=\"small-6 large-6 columns\">"), "{out}");
        assert!(out.contains("<th class=\"small-12 large-3 columns last\">"), "{out}");
        assert!(!out.contains("expander"));
    }

    #[test]
    fn nested_row_suppresses_expander() {
        let out = expand("<row><columns><row><columns large=\"6\">x</columns></row></columns></row>");
        assert_eq!(out.matches("expander").count(), 0, "{out}");
        let out = expand("<row><columns no-expander>x</columns></row>");
        assert!(!out.contains("expander"), "{out}");
    }

    #[test]
    fn attributes_are_carried_over_and_tags_survive() {
        let out = expand("<row><columns id=\"x\" data-role=\"%%PCU9IGEgJT4%%\" class=\"%%PCU9IGMgJT4%%\">v</columns></row>");
        assert!(
            out.contains("<th class=\"%%PCU9IGMgJT4%% small-12 large-12 columns first last\" data-role=\"%%PCU9IGEgJT4%%\">"),
            "{out}"
        );
        assert!(!out.contains("id=\"x\""));
    }

    #[test]
    fn button_with_link_and_expand() {
        assert_eq!(
            expand("<button class=\"expand\" href=\"https://x.io\" target=\"_blank\">Go</button>"),
            "<table class=\"button expand\"><tbody><tr><td><table><tbody><tr><td>\
             <center><a href=\"https://x.io\" target=\"_blank\">Go</a></center>\
             </td></tr></tbody></table></td>\n<td class=\"expander\"></td></tr></tbody></table>"
        );
    }

    #[test]
    fn spacer_defaults_to_sixteen() {
        assert_eq!(
            expand("<spacer/>"),
            "<table class=\"spacer\"><tbody><tr><td height=\"16\" style=\"font-size:16px;line-height:16px;\">&#xA0;</td></tr></tbody></table>"
        );
        let out = expand("<spacer size-sm=\"10\" size-lg=\"30\"></spacer>");
        assert!(out.contains("class=\"spacer hide-for-large\""));
        assert!(out.contains("class=\"spacer show-for-large\""));
        assert!(out.contains("height=\"30\""));
    }

    #[test]
    fn callout_wrapper_and_h_line() {
        assert_eq!(
            expand("<callout class=\"primary\">n</callout>"),
            "<table class=\"callout\"><tbody><tr><th class=\"callout-inner primary\">n</th><th class=\"expander\"></th></tr></tbody></table>"
        );
        assert_eq!(
            expand("<wrapper class=\"header\">w</wrapper>"),
            "<table class=\"wrapper header\" align=\"center\"><tbody><tr><td class=\"wrapper-inner\">w</td></tr></tbody></table>"
        );
        assert_eq!(
            expand("<h-line/>"),
            "<table class=\"h-line\"><tr><th>&nbsp;</th></tr></table>"
        );
    }

    #[test]
    fn centered_menu() {
        assert_eq!(
            expand("<center><menu><item href=\"/a\">A</item></menu></center>"),
            "<center><table align=\"center\" class=\"menu float-center\"><tbody><tr><td><table><tbody><tr>\
             <th class=\"menu-item float-center\"><a href=\"/a\">A</a></th>\
             </tr></tbody></table></td></tr></tbody></table></center>"
        );
    }

    #[test]
    fn block_grid() {
        assert_eq!(
            expand("<block-grid up=\"3\"><td>a</td></block-grid>"),
            "<table class=\"block-grid up-3\"><tbody><tr><td>a</td></tr></tbody></table>"
        );
        assert!(matches!(expand_err("<block-grid>x</block-grid>"), MarkupError::Structure(_)));
    }

    #[test]
    fn plain_markup_is_untouched() {
        let html = "<table><tr><td><p class=\"row\">x</p></td></tr></table>";
        assert_eq!(expand(html), html);
    }

    #[test]
    fn malformed_shorthand_is_rejected() {
        assert!(matches!(expand_err("<container><columns>x</columns></container>"), MarkupError::Structure(_)));
        assert!(matches!(expand_err("<row><columns small=\"13\">x</columns></row>"), MarkupError::Structure(_)));
        assert!(matches!(expand_err("<row><columns large=\"half\">x</columns></row>"), MarkupError::Structure(_)));
        assert!(matches!(expand_err("<item href=\"/\">x</item>"), MarkupError::Structure(_)));
        assert!(matches!(expand_err("<spacer size=\"big\"/>"), MarkupError::Structure(_)));
    }
}
