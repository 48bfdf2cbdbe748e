//! Foundation utilities shared by the engine and renderer

pub mod logging;
pub mod math;
pub mod time;
