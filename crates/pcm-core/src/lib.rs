//! pcm-core: Core types for the PCM product-metadata API
//!
//! This crate provides:
//! - The closed set of product types and their collection mapping
//! - Parts, revision and aggregate row types shared by store, server and CLI
//!
//! It performs no I/O.

pub mod types;

pub use types::*;
