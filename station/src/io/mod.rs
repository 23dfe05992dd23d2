//! I/O helpers for station commands.

pub mod atomic;
pub mod config;
pub mod console;
pub mod init;
pub mod store;
