//! Procedure execution engine for station test benches.
//!
//! A target (for example a switchboard) has a test procedure assigned to it.
//! The operator steps through the procedure's checklist, and a completion pass
//! reconciles every unchecked requirement before one result per requirement is
//! written. The crate separates:
//!
//! - **[`core`]**: Pure logic (requirement ingestion, definition loading,
//!   navigation, the reconciliation review). No I/O.
//! - **[`io`]**: The store boundary, `.station/` layout, config and the console
//!   presentation.
//!
//! Orchestration modules ([`session`], [`complete`], [`run`]) combine the two to
//! implement CLI commands.

pub mod complete;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
