//! Style resolver – assembles the stylesheet that gets inlined.
//!
//! The sheet is, in cascade order: the bundled Foundation for Emails CSS (in
//! framework mode), the project stylesheet (compiled SCSS, or else raw CSS),
//! and finally whatever `<style>` blocks the composed template carries.

use std::fs;
use std::path::{Path, PathBuf};

use crate::dom::{Document, Element, Node};
use crate::error::{Error, Result};

/// Foundation for Emails, bundled with the binary.
pub const FOUNDATION_CSS: &str = include_str!("../assets/foundation-emails.css");

/// Inputs of the project stylesheet.
#[derive(Debug, Clone, Default)]
pub struct StyleOptions {
    /// Prepend [`FOUNDATION_CSS`].
    pub use_framework: bool,
    /// SCSS entry point; wins over `css_path`.
    pub scss_path: Option<PathBuf>,
    pub css_path: Option<PathBuf>,
}

/// Build the stylesheet shared by every template.
pub fn resolve_styles(options: &StyleOptions) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    if options.use_framework {
        parts.push(FOUNDATION_CSS.to_string());
    }
    match (&options.scss_path, &options.css_path) {
        (Some(scss), css) => {
            if let Some(css) = css {
                log::warn!(
                    "both SCSS ({}) and CSS ({}) configured; using SCSS",
                    scss.display(),
                    css.display()
                );
            }
            parts.push(compile_scss(scss)?);
        }
        (None, Some(css)) => {
            log::info!("reading stylesheet {}", css.display());
            parts.push(fs::read_to_string(css).map_err(|e| Error::io(css, e))?);
        }
        (None, None) => {}
    }
    Ok(parts.join("\n"))
}

/// Compile an SCSS file (imports resolve relative to it).
pub fn compile_scss(path: &Path) -> Result<String> {
    log::info!("compiling {}", path.display());
    fs::metadata(path).map_err(|e| Error::io(path, e))?;
    grass::from_path(path, &grass::Options::default()).map_err(|e| Error::Scss {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Concatenated contents of every `<style>` element, in document order.
/// Blocks marked `data-embed` are meant to stay in the output and are skipped.
pub fn collect_style_blocks(doc: &Document) -> String {
    let mut css = String::new();
    collect_in(&doc.children, &mut css);
    css
}

fn collect_in(nodes: &[Node], css: &mut String) {
    for node in nodes {
        if let Node::Element(e) = node {
            if e.is("style") {
                if !e.has_attr("data-embed") {
                    push_text(e, css);
                }
            } else {
                collect_in(&e.children, css);
            }
        }
    }
}

fn push_text(style: &Element, css: &mut String) {
    for child in &style.children {
        if let Node::Text(t) = child {
            css.push_str(t);
        }
    }
}
