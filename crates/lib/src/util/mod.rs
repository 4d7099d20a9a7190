//! Shared utilities.
//!
//! Common utilities used across the crate including digests, glob patterns and test helpers.

pub mod hash;
pub mod pattern;

#[cfg(test)]
pub mod testutil;
