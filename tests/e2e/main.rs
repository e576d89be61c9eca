//! End-to-end scenarios for the CMS client against the in-memory backend.

mod harness;
mod scenarios;
