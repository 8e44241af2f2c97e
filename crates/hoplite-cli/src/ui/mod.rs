//! # CLI UI Module
//!
//! Styling and formatting for hoplite CLI output.
//!
//! - `color`: color mode detection (`--color`, `NO_COLOR`, TTY)
//! - `style`: message prefixes and inline styling
//! - `format`: durations, scores and text previews
//! - `table`: retrieval result tables with comfy-table

pub mod color;
pub mod format;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use style::{MessageType, Style};
