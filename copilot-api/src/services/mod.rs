//! Service Layer
//!
//! Business logic that sits between the route handlers and the library
//! crates.

pub mod intake_service;

pub use intake_service::{IntakeContext, IntakeEvent, IntakeOutcome, IntakeService};
