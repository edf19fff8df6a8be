//! Common helpers for integration tests.
//!
//! # Modules
//!
//! - `logger`: Structured test logging infrastructure
//! - `mock_service`: wiremock stand-in for the generation service

pub mod logger;
pub mod mock_service;
