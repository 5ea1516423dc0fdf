//! Analysis stage tests
//!
//! Tests for:
//! - Missing-value cleaning
//! - Smoothing, threshold and outlier filters
//! - Correlation matrix and rankings
//! - Fourier, PSD and band filtering

pub mod cleaner_tests;
