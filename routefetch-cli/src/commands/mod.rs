//! CLI command implementations.

mod common;
pub mod info;
pub mod install;
pub mod list;
