//! `stocktake stock` - stock lookups.

use clap::Subcommand;
use stocktake_client::{InventoryClient, Operation};
use stocktake_core::{ItemId, WarehouseId};
use tracing::info;

use super::CliError;

#[derive(Debug, Subcommand)]
pub enum StockAction {
    /// Bins currently holding an item in a warehouse
    Bins {
        #[arg(short, long)]
        item: ItemId,
        #[arg(short, long)]
        warehouse: WarehouseId,
    },
}

pub async fn run(client: &InventoryClient, action: StockAction) -> Result<(), CliError> {
    match action {
        StockAction::Bins { item, warehouse } => {
            let bins = client
                .checks()
                .candidate_bins(item, warehouse)
                .await
                .map_err(CliError::during(Operation::Fetch))?;
            if bins.is_empty() {
                info!(%item, %warehouse, "No bins hold this item");
            }
            for bin in &bins {
                info!(
                    bin = %bin.bin_id,
                    code = %bin.bin_code,
                    stock = %bin.current_stock,
                    "Candidate bin"
                );
            }
        }
    }
    Ok(())
}
