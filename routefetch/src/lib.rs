//! RouteFetch - content installation for Open Rails style route packages
//!
//! This library fetches a remotely hosted content package by git clone or zip
//! download, expands it onto local storage while reporting progress, and
//! registers the installed package under a unique name.
//!
//! - [`content`]: catalog entries and installation records
//! - [`installer`]: the installation job and its stages
//! - [`registry`]: installed content name → directory store
//! - [`config`]: `~/.routefetch/config.ini`
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod content;
pub mod installer;
pub mod logging;
pub mod registry;
pub mod units;
