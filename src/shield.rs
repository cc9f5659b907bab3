//! Tag shield – hides EEx tags (`<% ... %>`) from stages that do not know
//! about them.
//!
//! Every tag is replaced by an opaque token `%%<base64url>%%` that contains no
//! whitespace and no HTML-special characters, so parsers, the CSS inliner and
//! the text wrapper all treat it as one ordinary word. Literal `%%` runs in the
//! source are tokenised as well, which keeps `unshield` unambiguous: after
//! shielding, every `%%` in the text belongs to a token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;

/// Delimiter on both sides of a token.
pub const TOKEN_DELIMITER: &str = "%%";

/// A tag, non-greedy and possibly spanning lines, or a literal delimiter.
static SHIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<%.*?%>|%%").expect("static shield pattern")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%%([A-Za-z0-9_-]+)%%").expect("static token pattern")
});

/// Replace every EEx tag in `text` with a shield token.
pub fn shield(text: &str) -> String {
    SHIELD_RE
        .replace_all(text, |caps: &regex::Captures<'_>| encode(&caps[0]))
        .into_owned()
}

/// Restore the tags hidden by [`shield`].
///
/// A token whose payload does not decode is left untouched.
pub fn unshield(text: &str) -> String {
    TOKEN_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            decode(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Width of `text` in characters once its tokens are restored.
pub fn display_width(text: &str) -> usize {
    let mut width = 0;
    let mut last = 0;
    for caps in TOKEN_RE.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        width += text[last..m.start()].chars().count();
        width += match decode(&caps[1]) {
            Some(tag) => tag.chars().count(),
            None => m.as_str().len(),
        };
        last = m.end();
    }
    width + text[last..].chars().count()
}

/// Apply `f` to the text between tokens, leaving the tokens themselves as
/// they are.
pub fn map_outside_tokens(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in TOKEN_RE.find_iter(text) {
        out.push_str(&f(&text[last..m.start()]));
        out.push_str(m.as_str());
        last = m.end();
    }
    out.push_str(&f(&text[last..]));
    out
}

fn encode(original: &str) -> String {
    format!(
        "{TOKEN_DELIMITER}{}{TOKEN_DELIMITER}",
        B64.encode(original.as_bytes())
    )
}

fn decode(payload: &str) -> Option<String> {
    let bytes = B64.decode(payload).ok()?;
    String::from_utf8(bytes).ok()
}
