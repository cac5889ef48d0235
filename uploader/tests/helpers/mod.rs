//! Test helpers for integration tests
//!
//! - StubService: in-process stand-in for the VESPA record service

pub mod stub_service;

pub use stub_service::{StubConfig, StubService};
