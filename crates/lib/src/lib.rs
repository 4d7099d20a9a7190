//! modforge-lib: Core types and logic for modforge
//!
//! This crate provides everything a reproducible multi-module build needs:
//! - `checksum`: SHA-512 verification of resolved artifacts against an allow-list
//! - `graph`: the module dependency graph and its build order
//! - `config`: layered property resolution into a typed `BuildConfig`
//! - `execute`: the worker pool that builds modules in dependency order
//! - `coverage`: merging per-module coverage traces into one report
//! - `audit` and `release`: the license gate and reproducible distribution archives
//! - `pipeline`: the stage state machine tying them together

pub mod audit;
pub mod checksum;
pub mod config;
pub mod consts;
pub mod coverage;
pub mod execute;
pub mod graph;
pub mod manifest;
pub mod pipeline;
pub mod release;
pub mod util;
