//! Shared test utilities for bulkload integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs against a temp directory and database
//! - Builders for import options and fixture records

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{users_parser, TestHarness, UserRecord};
