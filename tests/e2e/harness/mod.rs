//! E2E test harness for the CMS client.
//!
//! Scenarios drive a client context against the in-memory backend. Some
//! builders and assertion variants are only used by a few scenarios.

#![allow(dead_code)]

pub mod scenario;
pub mod steps;

// Re-export commonly used types
pub use assertions::Assertion;
pub use scenario::Scenario;
pub use steps::{ArgSpec, Listing, PageAction, Relation};
