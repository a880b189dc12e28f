//! Command implementations for the FastaVal CLI

pub mod config;
pub mod validate;
