//! Build configuration, read once from the environment.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::style::StyleOptions;

pub const TEMPLATE_DIR_VAR: &str = "SMOOTHIE_TEMPLATE_DIR";
pub const LAYOUT_FILE_VAR: &str = "SMOOTHIE_LAYOUT_FILE";
pub const CSS_FILE_VAR: &str = "SMOOTHIE_CSS_FILE";
pub const SCSS_FILE_VAR: &str = "SMOOTHIE_SCSS_FILE";
pub const USE_FOUNDATION_VAR: &str = "SMOOTHIE_USE_FOUNDATION";
pub const PRESERVE_MEDIA_QUERIES_VAR: &str = "SMOOTHIE_PRESERVE_MEDIA_QUERIES";

/// Name of the output directory inside the template directory.
pub const BUILD_DIR: &str = "build";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub template_dir: PathBuf,
    pub layout_file: Option<PathBuf>,
    pub css_file: Option<PathBuf>,
    pub scss_file: Option<PathBuf>,
    pub use_foundation: bool,
    pub preserve_media_queries: bool,
}

impl Config {
    /// Read the `SMOOTHIE_*` variables of the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let path = |key: &str| get(key).map(PathBuf::from);
        let flag = |key: &str| get(key).is_some_and(|v| v == "true");
        // On unless switched off with the literal `false`.
        let opt_out = |key: &str| get(key).map_or(true, |v| v != "false");

        let template_dir = path(TEMPLATE_DIR_VAR).ok_or(Error::MissingTemplateDir)?;
        Ok(Self {
            template_dir,
            layout_file: path(LAYOUT_FILE_VAR),
            css_file: path(CSS_FILE_VAR),
            scss_file: path(SCSS_FILE_VAR),
            use_foundation: flag(USE_FOUNDATION_VAR),
            preserve_media_queries: opt_out(PRESERVE_MEDIA_QUERIES_VAR),
        })
    }

    /// Where the artifacts are written.
    pub fn build_dir(&self) -> PathBuf {
        self.template_dir.join(BUILD_DIR)
    }

    pub fn style_options(&self) -> StyleOptions {
        StyleOptions {
            use_framework: self.use_foundation,
            scss_path: self.scss_file.clone(),
            css_path: self.css_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn template_dir_is_required() {
        let err = config(&[]).unwrap_err();
        assert!(matches!(err, Error::MissingTemplateDir));
        assert_eq!(err.to_string(), "No template dir specified");
    }

    #[test]
    fn empty_values_count_as_unset() {
        assert!(matches!(
            config(&[(TEMPLATE_DIR_VAR, "")]),
            Err(Error::MissingTemplateDir)
        ));
        let cfg = config(&[(TEMPLATE_DIR_VAR, "mail"), (LAYOUT_FILE_VAR, "")]).unwrap();
        assert_eq!(cfg.layout_file, None);
    }

    #[test]
    fn reads_every_option() {
        let cfg = config(&[
            (TEMPLATE_DIR_VAR, "priv/templates"),
            (LAYOUT_FILE_VAR, "priv/layout.html.eex"),
            (CSS_FILE_VAR, "priv/style.css"),
            (SCSS_FILE_VAR, "priv/style.scss"),
            (USE_FOUNDATION_VAR, "true"),
            (PRESERVE_MEDIA_QUERIES_VAR, "false"),
        ])
        .unwrap();
        assert_eq!(cfg.template_dir, PathBuf::from("priv/templates"));
        assert_eq!(cfg.build_dir(), PathBuf::from("priv/templates/build"));
        assert_eq!(cfg.layout_file, Some(PathBuf::from("priv/layout.html.eex")));
        assert!(cfg.use_foundation);
        assert!(!cfg.preserve_media_queries);

        let style = cfg.style_options();
        assert!(style.use_framework);
        assert_eq!(style.scss_path, Some(PathBuf::from("priv/style.scss")));
        assert_eq!(style.css_path, Some(PathBuf::from("priv/style.css")));
    }

    #[test]
    fn flags_need_the_literal_true() {
        for value in ["1", "yes", "TRUE", "True"] {
            let cfg = config(&[(TEMPLATE_DIR_VAR, "t"), (USE_FOUNDATION_VAR, value)]).unwrap();
            assert!(!cfg.use_foundation, "{value} must not enable foundation");
        }
    }

    #[test]
    fn media_queries_are_kept_unless_switched_off() {
        let cfg = config(&[(TEMPLATE_DIR_VAR, "t")]).unwrap();
        assert!(!cfg.use_foundation);
        assert!(cfg.preserve_media_queries);
        for value in ["0", "no", "FALSE", "", "true"] {
            let cfg = config(&[(TEMPLATE_DIR_VAR, "t"), (PRESERVE_MEDIA_QUERIES_VAR, value)]).unwrap();
            assert!(cfg.preserve_media_queries, "{value:?} must not disable media queries");
        }
    }
}
