//! Integration tests for Stocktake.
//!
//! The tests in `tests/` talk to a live inventory backend and are ignored by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! STOCKTAKE_TEST_BASE_URL=http://localhost:8081 \
//! STOCKTAKE_TEST_TOKEN=... \
//! cargo test -p stocktake-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `STOCKTAKE_TEST_BASE_URL` - Backend under test (default: `http://localhost:8081`)
//! - `STOCKTAKE_TEST_TOKEN` - Bearer token; requests are unauthenticated without it
//! - `STOCKTAKE_TEST_WAREHOUSE_ID` - Warehouse used for check tests (default: 1)
//! - `STOCKTAKE_TEST_ITEM_ID` - Item with stock in that warehouse (default: 1)

use std::sync::Arc;

use secrecy::SecretString;
use stocktake_client::{ClientConfig, ClientError, HttpTransport, InventoryClient, TokenStore};
use stocktake_core::{ItemId, WarehouseId};
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:8081";

/// Base URL for the backend under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOCKTAKE_TEST_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

/// Warehouse and item the check tests count.
#[must_use]
pub fn fixture_ids() -> (WarehouseId, ItemId) {
    let read = |name: &str| {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(1)
    };
    (
        WarehouseId::new(read("STOCKTAKE_TEST_WAREHOUSE_ID")),
        ItemId::new(read("STOCKTAKE_TEST_ITEM_ID")),
    )
}

/// A client for the backend under test, with an in-memory token store so
/// test runs never touch the developer's saved token.
///
/// # Errors
///
/// Returns an error if the base URL is invalid or the HTTP client cannot be
/// built.
pub async fn test_client() -> Result<InventoryClient, ClientError> {
    let base = Url::parse(&base_url()).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
    let config = ClientConfig::new(base);
    let tokens = TokenStore::memory();
    if let Ok(token) = std::env::var("STOCKTAKE_TEST_TOKEN") {
        tokens.login(SecretString::from(token)).await?;
    }
    let transport = HttpTransport::new(&config, tokens.clone())?;
    Ok(InventoryClient::with_transport(config, tokens, Arc::new(transport)))
}
