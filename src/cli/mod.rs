//! Command line entry points.

pub mod config;
pub mod inspect;
pub mod serve;
