//! # Herbarium Core
//!
//! The admission-control domain: caller identity, the policy table, the
//! sliding-window decision engine, CORS/CSP policy and API-version routing.
//! This crate contains pure logic; storage and delivery live behind ports.

pub mod admission;
pub mod domain;
pub mod error;
pub mod ports;

pub use admission::{Admission, AdmissionController};
pub use error::{AlertError, PolicyError, RateLimitError};
