//! Simple cli/daemon for tracking which labeled activity you are currently
//! working on. Sessions are started and stopped from a terminal, persisted as
//! plain JSON on disk, and summarized into daily statistics.
//!

pub mod cli;
pub mod daemon;
pub mod tracker;
pub mod utils;
