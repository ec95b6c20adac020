//! Core library for compiling a cluster's configuration catalog from Git-hosted
//! components, packages, and inventory classes.
//!
//! The CLI front-end (`src/bin/commodore.rs`) is a thin wrapper around this crate: it
//! parses arguments, builds a [`config::Config`], and maps any returned [`error::Error`]
//! to a process exit code via [`error::Error::exit_code`].

#![allow(clippy::missing_docs_in_private_items)]
#![warn(clippy::missing_errors_doc, clippy::missing_panic_doc)]

pub mod catalog;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod inventory;
pub mod pipeline;
pub mod postprocess;
pub mod refs;
pub mod registry;
pub mod target;
pub mod tokencache;
pub mod tool;
pub mod url;
pub mod value;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
