//! # hoplite CLI
//!
//! Command-line access to the hybrid rules retrieval engine in
//! `hoplite-core`. Run `hoplite --help` for usage information.

mod cli;
mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
