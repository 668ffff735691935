//! Shared fixtures for the ktx integration test suites.

pub mod common;
pub mod support;
