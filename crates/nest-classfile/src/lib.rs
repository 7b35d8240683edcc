#![forbid(unsafe_code)]

//! Decoder for the fixed-layout head of a JVM class file.
//!
//! Resolution only needs to know which class a blob of bytes declares, so
//! decoding stops after the interface table; fields, methods and attributes
//! are never inspected.

mod constant_pool;
mod error;
mod header;
mod reader;

pub use crate::error::{Error, Result};
pub use crate::header::{binary_to_internal, internal_to_binary, ClassHeader};
