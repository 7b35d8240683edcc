//! Fixture builders shared by nest tests.
//!
//! Jars are authored in memory with [`JarBuilder`] so tests never depend on
//! checked-in binaries, and nested jars are just builders inside builders.

mod class;
mod jar;

pub use class::{class_bytes, class_bytes_with_super};
pub use jar::JarBuilder;
