//! # smoothie – EEx email template builder
//!
//! Turns a directory of `*.html.eex` email templates into ready-to-send
//! HTML with inlined styles plus a plain-text alternative, keeping the EEx
//! tags intact so the result can still be rendered at send time. The stages
//! are:
//!
//! 1. **Compose** – wrap the body in the shared layout ([`layout`])
//! 2. **Shield** – hide `<% ... %>` tags behind opaque tokens ([`shield`])
//! 3. **Parse** – shielded markup → DOM tree ([`dom`])
//! 4. **Style** – assemble the stylesheet ([`style`], [`css`])
//! 5. **Expand** – Foundation for Emails grid shorthand, when enabled ([`grid`])
//! 6. **Inline** – move CSS into `style` attributes ([`inline`])
//! 7. **Text** – derive the plain-text part ([`render`])
//!
//! [`pipeline::Pipeline`] runs them for every template, configured by
//! [`config::Config`].

pub mod config;
pub mod css;
pub mod dom;
pub mod error;
pub mod grid;
pub mod inline;
pub mod layout;
pub mod pipeline;
pub mod render;
pub mod shield;
pub mod style;
pub mod templates;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Artifacts, Pipeline};
