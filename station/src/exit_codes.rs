//! Stable exit codes for station CLI commands.

/// Command succeeded; for `station run`, results were saved.
pub const OK: i32 = 0;
/// Invalid layout, config or definition, unknown target, or other errors.
pub const INVALID: i32 = 1;
/// `station run` ended without saving (operator quit or input ended).
pub const ABORTED: i32 = 2;
/// `station run` ended after a save that stopped part-way.
pub const PARTIAL_FAILURE: i32 = 3;
