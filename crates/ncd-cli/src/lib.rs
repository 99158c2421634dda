//! Command-line front end for normalized compression distance.

pub mod app;
pub mod config;
pub mod format;
pub mod inputs;
pub mod progress;
