//! Unit tests for restic-agent
//!
//! Every external process is replaced by a recording mock executor.

mod config;
mod orchestrator;
mod steps;
