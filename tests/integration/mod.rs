//! Integration tests for end-to-end functionality
//!
//! Tests for:
//! - Load, clean and persist cycles through SQLite
//! - Stored correlation and spectral results
//! - Idempotent re-runs

pub mod pipeline_tests;
