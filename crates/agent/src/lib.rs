//! `throtl-agent` library crate.
//!
//! Collects snapshots from a live vLLM server or the built-in simulation
//! and runs the core analysis on every tick. Exposed as a library for
//! integration testing; the binary entrypoint lives in `main.rs`.

pub mod collector;
pub mod config;
pub mod gpu;
pub mod mock;
pub mod runner;
