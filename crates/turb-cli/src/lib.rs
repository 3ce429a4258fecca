//! Turbulence CLI - operator tools for the analytics pipeline.
//!
//! Binaries:
//! - simulate_decoder: synthetic decoder feed serving `/traffic`
//! - analyze_replay: one-shot analysis of a recorded snapshot

pub mod sim;
