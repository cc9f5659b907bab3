//! Layout composer – wraps each template body in the shared layout.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};

/// Token in the layout replaced by the template body.
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// Read the layout file.
///
/// A path that does not name an existing regular file yields
/// [`Error::LayoutNotFound`]; any other I/O failure is reported as-is.
pub fn load_layout(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::LayoutNotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::LayoutNotFound(path.to_path_buf()),
        _ => Error::io(path, e),
    })
}

/// Substitute `body` into the first `{content}` of `layout`.
///
/// Without a layout the body passes through unchanged. A layout lacking the
/// placeholder is returned as is.
pub fn compose(layout: Option<&str>, body: &str) -> String {
    let Some(layout) = layout else {
        return body.to_string();
    };
    match layout.find(CONTENT_PLACEHOLDER) {
        Some(at) => {
            let mut composed = String::with_capacity(layout.len() + body.len());
            composed.push_str(&layout[..at]);
            composed.push_str(body);
            composed.push_str(&layout[at + CONTENT_PLACEHOLDER.len()..]);
            composed
        }
        None => {
            log::warn!("layout has no {CONTENT_PLACEHOLDER} placeholder; template body dropped");
            layout.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_layout_is_identity() {
        let body = "<p>Hi <%= name %></p>";
        assert_eq!(compose(None, body), body);
    }

    #[test]
    fn only_the_first_placeholder_is_replaced() {
        let layout = "<body>{content}<footer>{content}</footer></body>";
        assert_eq!(
            compose(Some(layout), "<p>x</p>"),
            "<body><p>x</p><footer>{content}</footer></body>"
        );
    }

    #[test]
    fn body_is_inserted_literally() {
        let layout = "<div>{content}</div>";
        let body = "$& $1 {content} <%= @x %>";
        assert_eq!(compose(Some(layout), body), format!("<div>{body}</div>"));
    }

    #[test]
    fn layout_without_placeholder_is_unchanged() {
        assert_eq!(compose(Some("<div></div>"), "<p>x</p>"), "<div></div>");
    }

    #[test]
    fn missing_layout_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_layout(&dir.path().join("wrong.html.eex")).unwrap_err();
        assert!(matches!(err, Error::LayoutNotFound(_)));
        assert!(err.is_user_facing());

        let err = load_layout(dir.path()).unwrap_err();
        assert!(matches!(err, Error::LayoutNotFound(_)), "a directory is not a layout");
    }

    #[test]
    fn existing_layout_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.html.eex");
        std::fs::write(&path, "<html>{content}</html>").unwrap();
        assert_eq!(load_layout(&path).unwrap(), "<html>{content}</html>");
    }
}
