// src/lib.rs
// Library interface for certsio
pub mod certificate;
pub mod certresolve;
pub mod cli;
pub mod config;
pub mod interrupt;
pub mod output;
pub mod progress;
pub mod resolver;
pub mod search;
pub mod stats;
