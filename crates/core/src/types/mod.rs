//! Core types for Stocktake.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod endpoint;
pub mod id;
pub mod quantity;
pub mod status;

pub use endpoint::{Endpoint, EndpointError};
pub use id::*;
pub use quantity::Quantity;
pub use status::*;
