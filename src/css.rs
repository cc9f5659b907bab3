//! CSS model – just enough of a stylesheet parser and selector engine to
//! inline email styles.
//!
//! Style rules become [`Rule`]s with parsed selectors. `@media` blocks are
//! kept as raw text since they cannot be inlined; other at-rules are dropped.

use std::cmp::Ordering;

use crate::dom::Element;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// One `property: value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Property name as written; `Margin` and `margin` stay distinct so the
    /// capitalised Outlook variants survive inlining.
    pub property: String,
    /// Value without the `!important` marker.
    pub value: String,
    pub important: bool,
}

impl Declaration {
    /// Render as `property: value` (with `!important` when asked and set).
    pub fn to_css(&self, keep_important: bool) -> String {
        if self.important && keep_important {
            format!("{}: {} !important", self.property, self.value)
        } else {
            format!("{}: {}", self.property, self.value)
        }
    }
}

/// Parse a declaration block such as the body of a rule or a `style`
/// attribute. Malformed entries are skipped.
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    split_top_level(block, ';')
        .into_iter()
        .filter_map(|decl| {
            let decl = decl.trim();
            let (prop, val) = decl.split_once(':')?;
            let prop = prop.trim();
            let mut val = val.trim();
            if prop.is_empty() || val.is_empty() {
                return None;
            }
            let mut important = false;
            if let Some(bang) = val.rfind('!') {
                if val[bang + 1..].trim().eq_ignore_ascii_case("important") {
                    important = true;
                    val = val[..bang].trim_end();
                }
            }
            Some(Declaration {
                property: prop.to_string(),
                value: val.to_string(),
                important,
            })
        })
        .collect()
}

/// Split on `sep` outside quotes, parentheses and brackets.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

// ---------------------------------------------------------------------------
// Stylesheet
// ---------------------------------------------------------------------------

/// A style rule with a single selector (selector lists are split).
#[derive(Debug, Clone)]
pub struct Rule {
    pub selector: Selector,
    pub declarations: Vec<Declaration>,
    /// Position in the sheet, for cascade ties.
    pub order: usize,
}

/// Block at-rules that cannot be inlined but still apply in clients that
/// read `<style>` elements.
const PRESERVED_AT_RULES: &[&str] = &["media", "font-face"];

/// A parsed stylesheet.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    pub rules: Vec<Rule>,
    /// `@media` and `@font-face` blocks verbatim, in source order.
    pub preserved_at_rules: Vec<String>,
    /// Selectors that could not be inlined (pseudo-classes and the like).
    pub skipped_selectors: Vec<String>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let css = strip_comments(css);
        let mut sheet = Stylesheet::default();
        let mut rest = css.as_str();
        let mut order = 0;

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with('@') {
                rest = sheet.take_at_rule(rest);
                continue;
            }
            let Some(open) = find_outside_quotes(rest, '{') else {
                break;
            };
            let prelude = rest[..open].trim();
            let (body, after) = split_block(&rest[open..]);
            rest = after;

            let declarations = parse_declarations(body);
            for raw in split_top_level(prelude, ',') {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                match Selector::parse(raw) {
                    Some(selector) => {
                        sheet.rules.push(Rule {
                            selector,
                            declarations: declarations.clone(),
                            order,
                        });
                        order += 1;
                    }
                    None => sheet.skipped_selectors.push(raw.to_string()),
                }
            }
        }
        sheet
    }

    /// Consume one at-rule from the front of `rest`, returning what follows.
    fn take_at_rule<'a>(&mut self, rest: &'a str) -> &'a str {
        let semi = find_outside_quotes(rest, ';');
        let open = find_outside_quotes(rest, '{');
        match (semi, open) {
            (Some(s), Some(o)) if s < o => &rest[s + 1..],
            (Some(s), None) => &rest[s + 1..],
            (_, Some(o)) => {
                let (_, after) = split_block(&rest[o..]);
                let whole = &rest[..rest.len() - after.len()];
                let keyword = whole[1..].to_ascii_lowercase();
                if PRESERVED_AT_RULES.iter().any(|k| keyword.starts_with(k)) {
                    self.preserved_at_rules.push(whole.trim().to_string());
                }
                after
            }
            (None, None) => "",
        }
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn find_outside_quotes(s: &str, target: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == target => return Some(i),
            None => {}
        }
    }
    None
}

/// `s` starts at `{`; returns the block body and the text after its `}`.
fn split_block(s: &str) -> (&str, &str) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return (&s[1..i], &s[i + 1..]);
                    }
                }
                _ => {}
            },
        }
    }
    // Unbalanced: the rest of the sheet is the body.
    (&s[1..], "")
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    DashMatch(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSelector {
    pub name: String,
    pub op: AttrOp,
}

/// A compound selector such as `td.wrapper#main[align]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    /// `None` for `*` or no type selector.
    pub tag: Option<String>,
    pub ids: Vec<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrSelector>,
}

/// A complex selector stored right to left: the subject compound, then each
/// ancestor/sibling compound with the combinator that leads to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub subject: Compound,
    pub ancestors: Vec<(Combinator, Compound)>,
}

/// `(ids, classes + attributes, types)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity(pub u32, pub u32, pub u32);

impl Selector {
    /// Parse one selector; `None` if it uses anything that cannot be
    /// evaluated statically (pseudo-classes, pseudo-elements, namespaces).
    pub fn parse(input: &str) -> Option<Self> {
        let mut compounds: Vec<Compound> = Vec::new();
        let mut combinators: Vec<Combinator> = Vec::new();
        let mut current = Compound::default();
        let mut has_current = false;
        let mut pending: Option<Combinator> = None;
        let mut chars = input.trim().chars().peekable();

        while let Some(&c) = chars.peek() {
            let explicit = match c {
                '>' => Some(Combinator::Child),
                '+' => Some(Combinator::Adjacent),
                '~' => Some(Combinator::Sibling),
                _ => None,
            };
            if c.is_whitespace() || explicit.is_some() {
                chars.next();
                if has_current {
                    compounds.push(std::mem::take(&mut current));
                    has_current = false;
                    pending = Some(explicit.unwrap_or(Combinator::Descendant));
                } else if let Some(comb) = explicit {
                    // Only whitespace may separate a compound from `>`/`+`/`~`.
                    if pending != Some(Combinator::Descendant) {
                        return None;
                    }
                    pending = Some(comb);
                }
                continue;
            }
            if let Some(comb) = pending.take() {
                combinators.push(comb);
            }
            parse_compound_part(&mut chars, &mut current)?;
            has_current = true;
        }
        if !has_current {
            return None;
        }
        compounds.push(current);

        let subject = compounds.pop()?;
        let mut ancestors = Vec::with_capacity(compounds.len());
        while let Some(compound) = compounds.pop() {
            ancestors.push((combinators.pop()?, compound));
        }
        Some(Selector { subject, ancestors })
    }

    pub fn specificity(&self) -> Specificity {
        let mut spec = Specificity::default();
        for compound in std::iter::once(&self.subject).chain(self.ancestors.iter().map(|(_, c)| c)) {
            spec.0 += compound.ids.len() as u32;
            spec.1 += (compound.classes.len() + compound.attrs.len()) as u32;
            spec.2 += u32::from(compound.tag.is_some());
        }
        spec
    }
}

fn parse_ident(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut ident = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            ident.push(c);
            chars.next();
        } else if c == '\\' {
            chars.next();
            ident.push(chars.next()?);
        } else {
            break;
        }
    }
    (!ident.is_empty()).then_some(ident)
}

fn parse_compound_part(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    compound: &mut Compound,
) -> Option<()> {
    match *chars.peek()? {
        '*' => {
            chars.next();
        }
        '.' => {
            chars.next();
            compound.classes.push(parse_ident(chars)?);
        }
        '#' => {
            chars.next();
            compound.ids.push(parse_ident(chars)?);
        }
        '[' => {
            chars.next();
            compound.attrs.push(parse_attr_selector(chars)?);
        }
        c if c.is_alphabetic() || c == '_' => {
            if compound.tag.is_some() {
                return None;
            }
            compound.tag = Some(parse_ident(chars)?.to_ascii_lowercase());
        }
        // ':' pseudo-classes, '|' namespaces and anything else.
        _ => return None,
    }
    Some(())
}

fn parse_attr_selector(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<AttrSelector> {
    let mut inner = String::new();
    let mut quote: Option<char> = None;
    loop {
        let c = chars.next()?;
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == ']' => break,
            None => {}
        }
        inner.push(c);
    }

    let ops: [(&str, fn(String) -> AttrOp); 6] = [
        ("~=", AttrOp::Includes),
        ("^=", AttrOp::Prefix),
        ("$=", AttrOp::Suffix),
        ("*=", AttrOp::Contains),
        ("|=", AttrOp::DashMatch),
        ("=", AttrOp::Equals),
    ];
    for (token, make) in ops {
        if let Some((name, value)) = inner.split_once(token) {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            return Some(AttrSelector {
                name: name.trim().to_ascii_lowercase(),
                op: make(value.to_string()),
            });
        }
    }
    let name = inner.trim();
    (!name.is_empty()).then(|| AttrSelector {
        name: name.to_ascii_lowercase(),
        op: AttrOp::Exists,
    })
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// One level of the path from the document root to an element: the element
/// and its preceding element siblings, nearest last.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    pub element: &'a Element,
    pub preceding: Vec<&'a Element>,
}

/// Position of a candidate element relative to a path: the level, and
/// either the level's own element (`None`) or one of its preceding siblings.
#[derive(Clone, Copy)]
struct Cursor {
    level: usize,
    sibling: Option<usize>,
}

impl Compound {
    pub fn matches(&self, e: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !e.name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.ids.iter().all(|id| e.attr("id") == Some(id.as_str())) {
            return false;
        }
        let classes = e.classes();
        if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
            return false;
        }
        self.attrs.iter().all(|a| a.matches(e))
    }
}

impl AttrSelector {
    fn matches(&self, e: &Element) -> bool {
        let Some(actual) = e.attr(&self.name) else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => actual == v,
            AttrOp::Includes(v) => actual.split_whitespace().any(|w| w == v),
            AttrOp::Prefix(v) => !v.is_empty() && actual.starts_with(v.as_str()),
            AttrOp::Suffix(v) => !v.is_empty() && actual.ends_with(v.as_str()),
            AttrOp::Contains(v) => !v.is_empty() && actual.contains(v.as_str()),
            AttrOp::DashMatch(v) => actual == v || actual.starts_with(&format!("{v}-")),
        }
    }
}

impl Selector {
    /// Whether the last element of `path` matches.
    pub fn matches(&self, path: &[Scope<'_>]) -> bool {
        let Some(last) = path.len().checked_sub(1) else {
            return false;
        };
        if !self.subject.matches(path[last].element) {
            return false;
        }
        self.match_from(
            0,
            Cursor {
                level: last,
                sibling: None,
            },
            path,
        )
    }

    fn match_from(&self, idx: usize, at: Cursor, path: &[Scope<'_>]) -> bool {
        let Some((comb, compound)) = self.ancestors.get(idx) else {
            return true;
        };
        let try_at = |c: Cursor| compound.matches(element_at(path, c)) && self.match_from(idx + 1, c, path);
        match comb {
            Combinator::Child => parent(at).is_some_and(try_at),
            Combinator::Descendant => {
                let mut cur = parent(at);
                while let Some(c) = cur {
                    if try_at(c) {
                        return true;
                    }
                    cur = parent(c);
                }
                false
            }
            Combinator::Adjacent => previous_siblings(path, at).last().is_some_and(|&c| try_at(c)),
            Combinator::Sibling => previous_siblings(path, at).into_iter().rev().any(try_at),
        }
    }
}

fn element_at<'a>(path: &[Scope<'a>], at: Cursor) -> &'a Element {
    match at.sibling {
        None => path[at.level].element,
        Some(i) => path[at.level].preceding[i],
    }
}

fn parent(at: Cursor) -> Option<Cursor> {
    at.level.checked_sub(1).map(|level| Cursor {
        level,
        sibling: None,
    })
}

/// Preceding siblings of `at`, furthest first.
fn previous_siblings(path: &[Scope<'_>], at: Cursor) -> Vec<Cursor> {
    let count = at.sibling.unwrap_or(path[at.level].preceding.len());
    (0..count)
        .map(|i| Cursor {
            level: at.level,
            sibling: Some(i),
        })
        .collect()
}

/// Order rules by ascending specificity, then source position.
pub fn cascade_order(a: &Rule, b: &Rule) -> Ordering {
    a.selector
        .specificity()
        .cmp(&b.selector.specificity())
        .then(a.order.cmp(&b.order))
}
