//! Typed form documents embedded in Markdown.
//!
//! A markform document is ordinary Markdown with form tags in it: a `form`
//! wrapping typed `field` tags (optionally grouped), free-prose `doc` blocks,
//! and `note` annotations. The crate round-trips such documents without
//! touching the prose, applies typed patches to field responses, validates
//! values against declared constraints, and drives a turn-based agent loop
//! that fills forms to completion.
//!
//! The layering is strict:
//!
//! - [`model`], [`parse`], [`serialize`], [`validate`], [`patch`],
//!   [`inspect`], [`harness`]: pure logic, no I/O.
//! - [`io`], [`agents`], [`config`]: side-effecting plumbing (filesystem,
//!   subprocesses) used by the CLI and command agents.

pub mod agents;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod harness;
pub mod inspect;
pub mod io;
pub mod logging;
pub mod model;
pub mod parse;
pub mod patch;
pub mod serialize;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;

/// Document format version written to and accepted from frontmatter.
pub const SPEC_VERSION: &str = "0.1";
