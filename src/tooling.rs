//! Tooling & Integration Layer
//!
//! Command-line access to the facade for inspecting a mirrored hierarchy.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
