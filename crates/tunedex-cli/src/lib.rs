//! Shared plumbing for the Tunedex command-line tools

pub mod output;
pub mod setup;
