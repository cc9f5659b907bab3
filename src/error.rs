//! Error taxonomy for the build.
//!
//! Two variants are configuration mistakes the user must fix and are printed
//! as a single line; everything else is propagated with its full cause chain.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::dom::MarkupError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// `SMOOTHIE_TEMPLATE_DIR` is unset or empty.
    #[error("No template dir specified")]
    MissingTemplateDir,

    /// The configured layout path does not name a readable file.
    #[error("Layout file not found")]
    LayoutNotFound(PathBuf),

    /// The SCSS compiler rejected the stylesheet; `message` carries its full
    /// report including the source location.
    #[error("failed to compile {}:\n{message}", path.display())]
    Scss { path: PathBuf, message: String },

    #[error("malformed markup in {file}: {source}")]
    Markup {
        file: String,
        #[source]
        source: MarkupError,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Whether the error is a known configuration problem that gets a
    /// one-line `Error: <message>` instead of a full report.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::MissingTemplateDir | Error::LayoutNotFound(_))
    }

    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn markup(file: impl Into<String>, source: MarkupError) -> Self {
        Error::Markup {
            file: file.into(),
            source,
        }
    }
}
