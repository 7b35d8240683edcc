//! Operations behind the `nest` binary, kept in a library so they can be
//! tested without spawning a process.

pub mod manifest;
pub mod report;

pub use crate::report::{boot, cat, exit_code, index, resolve, resources};
