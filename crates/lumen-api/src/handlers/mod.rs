//! HTTP route handlers.
//!
//! `jobs` holds the submission endpoints; `status` holds polling,
//! unregistration and health.

pub mod jobs;
pub mod status;
