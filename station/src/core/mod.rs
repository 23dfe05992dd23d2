//! Deterministic, pure logic for the procedure engine.
//!
//! Core modules must be free of I/O side effects. Collaborators (the operator
//! reviewer) are reached only through traits so every transition is testable
//! without a terminal or a store.

pub mod error;
pub mod loader;
pub mod navigation;
pub mod procedure;
pub mod requirement;
pub mod review;
pub mod types;
