//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod exclude;
pub mod fences;
pub mod frames;
pub mod language;
pub mod types;
