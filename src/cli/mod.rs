//! Command-line interface module.

mod args;
pub mod build;
pub mod docs;
pub mod workspace;

pub use args::{Cli, Commands};
