//! Color mode detection for CLI output.
//!
//! Respects the `NO_COLOR` environment variable (https://no-color.org/) and
//! TTY detection.

use std::io::IsTerminal;

use clap::ValueEnum;

/// Color output mode, selected with `--color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Always use colors, even when output is not a TTY.
    Always,
    /// Never use colors.
    Never,
    /// Colors only on a TTY without `NO_COLOR`.
    #[default]
    Auto,
}

impl ColorMode {
    /// Check if colors should be used.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal(),
        }
    }
}
