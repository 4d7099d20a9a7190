//! CLI integration tests.
//!
//! Module commands in the fixtures are POSIX shell, so these only run on unix.

#![cfg(unix)]

mod build_tests;
mod common;
mod coverage_tests;
mod release_tests;
