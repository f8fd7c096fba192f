//! Agent implementations for the fill harness.

pub mod command;

pub use command::CommandAgent;
