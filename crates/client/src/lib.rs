//! Stocktake Client - async access to the inventory backend.
//!
//! # Layers
//!
//! - [`transport`] - HTTP transport with bearer authentication
//! - [`cache`] - content-addressed page cache with per-endpoint invalidation
//! - [`engine`] - cached, deduplicated list reads
//! - [`mutation`] - writes that invalidate the endpoints they touch
//! - [`filter_store`] / [`list_view`] - filtered, paginated list views
//! - [`reconciliation`] - the inventory-check workflow
//! - [`client`] - wires the above together
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use stocktake_client::{ClientConfig, InventoryClient};
//! use stocktake_core::{Filter, Item, Resource};
//!
//! let config = ClientConfig::from_env()?;
//! let client = InventoryClient::connect(config).await?;
//! let mut items = client.list_view(Item::endpoint(), Filter::new());
//! items.set("search", "bolt").wait().await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter_store;
pub mod list_view;
pub mod mutation;
pub mod reconciliation;
pub mod token;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cache::{CacheKey, CachedPage, QueryCache};
pub use client::InventoryClient;
pub use config::{ClientConfig, ConfigError};
pub use engine::QueryEngine;
pub use error::{ClientError, Notice, NoticeLevel, Operation};
pub use filter_store::{FilterStore, Location, MemoryLocation};
pub use list_view::{FilteredList, ListSnapshot, LoadOutcome, LoadTicket};
pub use mutation::MutationGateway;
pub use reconciliation::CheckWorkflow;
pub use token::{TokenStore, TokenStoreError};
pub use transport::{ApiRequest, HttpTransport, Method, Transport};
