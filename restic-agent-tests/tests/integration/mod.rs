//! Integration tests for restic-agent
//!
//! These tests run the real restic binary, and Docker for the database
//! steps. Run with: `cargo test -p restic-agent-tests --test integration -- --ignored`

mod mariadb;
mod postgres;
mod volumes;
