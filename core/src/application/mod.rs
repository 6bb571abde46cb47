//! Application layer - Resolution algorithms.
//!
//! The functions here are written once against the `Channel` port, so every
//! channel resolves pids with the same filtering rules while issuing its
//! probing commands wherever it executes.

pub mod resolver;
