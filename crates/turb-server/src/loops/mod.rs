//! Background loops for continuous processing.

pub mod refresh_loop;
