//! # Herbarium Shared
//!
//! Wire types shared between the API server, its clients and the
//! security-alert collaborator.

pub mod dto;
pub mod response;

pub use response::{ErrorResponse, RateLimitedResponse, VersionErrorResponse};
