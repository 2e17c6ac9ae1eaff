//! Shared test helpers for integration tests.
//!
//! Note: We use `helpers/mod.rs` instead of `tests/helpers.rs` because Cargo
//! auto-discovers top-level `.rs` files in `tests/` as integration tests.

#![allow(dead_code)]

pub mod harness;
