//! Stocktake Core - Shared types library.
//!
//! This crate provides the types used across all Stocktake components:
//! - `client` - REST client, query cache, list views and the check workflow
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no HTTP clients,
//! no caches. Everything here can be unit tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, quantities, statuses and endpoint paths
//! - [`filter`] - List filters and their query-string form
//! - [`query`] - List/entity response envelopes
//! - [`entities`] - Typed schemas for backend entities
//! - [`check`] - Inventory check model and its state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod check;
pub mod entities;
pub mod filter;
pub mod query;
pub mod types;

pub use check::*;
pub use entities::*;
pub use filter::{Filter, FilterPatch, FilterValue};
pub use query::{Pagination, QueryResult};
pub use types::*;
