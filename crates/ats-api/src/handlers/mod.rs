//! HTTP handlers for ats-api.

pub mod candidates;
pub mod system;
