//! Shared library surface for the turbulence server and its tests.

pub mod api;
pub mod config;
pub mod control;
pub mod engine;
pub mod loops;
pub mod outage;
pub mod source;
