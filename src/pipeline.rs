//! Pipeline driver – turns every template in the template directory into an
//! inlined HTML file and a plain-text file under `build/`.
//!
//! Per template: compose → shield → parse → collect styles → (expand grid)
//! → render text → inline → unshield → write.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::dom::parse_html;
use crate::error::{Error, Result};
use crate::grid::expand_grid;
use crate::inline::{inline_document, InlineOptions};
use crate::layout::{compose, load_layout};
use crate::render::{render_text, TextOptions};
use crate::shield::{shield, unshield};
use crate::style::{collect_style_blocks, resolve_styles};

/// Suffix of the files picked up from the template directory.
pub const TEMPLATE_SUFFIX: &str = ".html.eex";

/// The two outputs of one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub html: String,
    pub text: String,
}

/// Steps a template goes through, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compose,
    Shield,
    Parse,
    CollectStyles,
    ExpandGrid,
    RenderText,
    Inline,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Compose => "compose",
            Stage::Shield => "shield",
            Stage::Parse => "parse",
            Stage::CollectStyles => "collect styles",
            Stage::ExpandGrid => "expand grid",
            Stage::RenderText => "render text",
            Stage::Inline => "inline",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// A configured build. Layout and base stylesheet are loaded once, up front.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    layout: Option<String>,
    base_css: String,
    inline_options: InlineOptions,
    text_options: TextOptions,
}

impl Pipeline {
    /// Load the shared layout and stylesheet. Nothing is written yet.
    pub fn new(config: &Config) -> Result<Self> {
        let layout = config.layout_file.as_deref().map(load_layout).transpose()?;
        let base_css = resolve_styles(&config.style_options())?;
        Ok(Self {
            config: config.clone(),
            layout,
            base_css,
            inline_options: InlineOptions {
                preserve_media_queries: config.preserve_media_queries,
                ..InlineOptions::default()
            },
            text_options: TextOptions::default(),
        })
    }

    /// Build the artifacts of one template. `name` is only used in errors
    /// and logs.
    pub fn render(&self, name: &str, body: &str) -> Result<Artifacts> {
        trace(name, Stage::Compose);
        let composed = compose(self.layout.as_deref(), body);

        trace(name, Stage::Shield);
        let shielded = shield(&composed);

        trace(name, Stage::Parse);
        let mut doc = parse_html(&shielded);

        trace(name, Stage::CollectStyles);
        let inline_css = collect_style_blocks(&doc);
        let css = if inline_css.is_empty() {
            self.base_css.clone()
        } else {
            format!("{}\n{inline_css}", self.base_css)
        };

        if self.config.use_foundation {
            trace(name, Stage::ExpandGrid);
            expand_grid(&mut doc).map_err(|e| Error::markup(name, e))?;
        }

        trace(name, Stage::RenderText);
        let text = unshield(&render_text(&doc, &self.text_options));

        trace(name, Stage::Inline);
        inline_document(&mut doc, &css, &self.inline_options);
        let html = unshield(&doc.to_html());

        Ok(Artifacts { html, text })
    }

    /// Build every template; returns how many were processed.
    pub fn run(&self) -> Result<usize> {
        let templates = discover_templates(&self.config.template_dir)?;
        log::info!(
            "found {} template(s) in {}",
            templates.len(),
            self.config.template_dir.display()
        );

        let build_dir = self.config.build_dir();
        fs::create_dir_all(&build_dir).map_err(|e| Error::io(&build_dir, e))?;

        for path in &templates {
            let name = file_name(path);
            let body = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            let artifacts = self.render(&name, &body)?;

            trace(&name, Stage::Write);
            let html_path = build_dir.join(&name);
            let text_path = build_dir.join(text_file_name(&name));
            fs::write(&html_path, &artifacts.html).map_err(|e| Error::io(&html_path, e))?;
            fs::write(&text_path, &artifacts.text).map_err(|e| Error::io(&text_path, e))?;
            log::info!("created {} and {}", html_path.display(), text_path.display());
        }
        Ok(templates.len())
    }
}

fn trace(name: &str, stage: Stage) {
    log::debug!("{name}: {stage}");
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Regular files in `dir` whose name ends in `.html.eex`, sorted by name.
pub fn discover_templates(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut templates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && file_name(&path).ends_with(TEMPLATE_SUFFIX) {
            templates.push(path);
        }
    }
    templates.sort();
    Ok(templates)
}

/// `welcome.html.eex` → `welcome.txt.eex`.
pub fn text_file_name(name: &str) -> String {
    name.replacen(".html", ".txt", 1)
}
