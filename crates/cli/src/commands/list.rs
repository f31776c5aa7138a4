//! `stocktake list` - filtered, paginated listing.
//!
//! # Usage
//!
//! ```bash
//! stocktake list /items --search bolt --limit 20
//! stocktake list /bins --filter warehouseId=2 --filter status=active
//! stocktake list /inventory-checks --filter checkStatus=completed --order code:desc
//! ```

use clap::Args;
use stocktake_client::{InventoryClient, ListSnapshot, Operation};
use stocktake_core::filter::{CURSOR, FROM, LIMIT, ORDER, PAGE, SEARCH, TO};
use stocktake_core::{Endpoint, Filter, FilterPatch};
use tracing::info;

use super::{CliError, parse_key_val};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Entity endpoint, e.g. `/items`
    pub endpoint: Endpoint,

    /// Page number (1-based)
    #[arg(long)]
    pub page: Option<i64>,

    /// Page size
    #[arg(long)]
    pub limit: Option<u32>,

    /// Free-text search
    #[arg(short, long)]
    pub search: Option<String>,

    /// Sort order, e.g. `code:asc`
    #[arg(long)]
    pub order: Option<String>,

    /// Cursor for cursor-paginated endpoints
    #[arg(long)]
    pub cursor: Option<String>,

    /// Start of the date range (ISO 8601)
    #[arg(long)]
    pub from: Option<String>,

    /// End of the date range (ISO 8601)
    #[arg(long)]
    pub to: Option<String>,

    /// Additional filter as KEY=VALUE (repeatable)
    #[arg(short, long = "filter", value_parser = parse_key_val)]
    pub filters: Vec<(String, String)>,
}

impl ListArgs {
    /// Filters given on the command line, as a single update.
    pub fn patch(&self) -> FilterPatch {
        let mut patch = FilterPatch::new();
        if let Some(page) = self.page {
            patch = patch.set(PAGE, page);
        }
        if let Some(limit) = self.limit {
            patch = patch.set(LIMIT, limit);
        }
        let text = [
            (SEARCH, &self.search),
            (ORDER, &self.order),
            (CURSOR, &self.cursor),
            (FROM, &self.from),
            (TO, &self.to),
        ];
        for (key, value) in text {
            if let Some(value) = value {
                patch = patch.set(key, value.as_str());
            }
        }
        for (key, value) in &self.filters {
            patch = patch.set(key.as_str(), value.as_str());
        }
        patch
    }
}

pub async fn run(client: &InventoryClient, args: ListArgs) -> Result<(), CliError> {
    let patch = args.patch();
    let mut view = client.list_view(args.endpoint, Filter::new());
    view.set_many(&patch)
        .wait()
        .await
        .map_err(CliError::during(Operation::Fetch))?;

    print_page(&view.snapshot())
}

/// Log every row of the visible page, then its pagination.
pub fn print_page(snapshot: &ListSnapshot) -> Result<(), CliError> {
    let Some(page) = &snapshot.data else {
        info!("No results");
        return Ok(());
    };
    for row in &page.items {
        info!("{}", serde_json::to_string(row).map_err(stocktake_client::ClientError::from)?);
    }
    if let Some(pagination) = snapshot.pagination() {
        info!(
            page = ?pagination.page,
            limit = ?pagination.limit,
            total = ?pagination.total,
            total_pages = ?pagination.total_pages,
            next_cursor = ?pagination.next_cursor,
            "{} row(s)",
            page.items.len()
        );
    } else {
        info!("{} row(s)", page.items.len());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;
    use stocktake_core::FilterValue;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ListArgs,
    }

    fn parse(args: &[&str]) -> ListArgs {
        TestCli::try_parse_from(std::iter::once("list").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_flags_become_one_patch() {
        let args = parse(&[
            "/items",
            "--page",
            "2",
            "--search",
            "bolt",
            "--filter",
            "warehouseId=3",
        ]);
        assert_eq!(args.endpoint.as_str(), "/items");

        let mut filter = Filter::new();
        filter.apply(&args.patch());
        assert_eq!(filter.page(), 2);
        assert_eq!(filter.get(SEARCH), Some(&FilterValue::from("bolt")));
        assert_eq!(filter.get("warehouseId"), Some(&FilterValue::from("3")));
        assert!(!filter.contains(LIMIT));
    }

    #[test]
    fn test_no_flags_is_an_empty_patch() {
        assert!(parse(&["/bins"]).patch().is_empty());
    }

    #[test]
    fn test_endpoint_with_query_is_rejected() {
        assert!(TestCli::try_parse_from(["list", "/items?page=2"]).is_err());
    }
}
