//! Stable exit codes for the markform CLI.

/// Command succeeded; for `fill`, the form is complete.
pub const OK: i32 = 0;
/// Parse/validation failure, bad config, or any other hard error.
pub const INVALID: i32 = 1;
/// `fill` stopped before completion (budget, stall, or aborted fields).
pub const PARTIAL: i32 = 2;
/// `fill` was cancelled or the agent failed.
pub const FAILED: i32 = 3;
