//! `stocktake check` - the inventory check workflow.
//!
//! # Usage
//!
//! ```bash
//! # Draft a check for two items; unlisted bins are counted as zero
//! stocktake check create --warehouse 2 --item 10 --item 11 --count 100=7 --count 101=12
//!
//! # Snapshot book quantities and compute discrepancies
//! stocktake check complete 42
//!
//! # Show remaining work, then resolve line by line
//! stocktake check pending
//! stocktake check resolve 42 --detail 7 --action ignore
//! stocktake check resolve 42 --detail 8 --action sales_order --partner 5
//!
//! # Discrepancy report for a period
//! stocktake check report --from 2024-01-01 --to 2024-01-31
//! ```

use std::str::FromStr;

use clap::Subcommand;
use rust_decimal::Decimal;
use stocktake_client::{CheckWorkflow, FilterStore, InventoryClient, Operation, Transport};
use stocktake_core::filter::{FROM, TO};
use stocktake_core::{
    BinId, CheckDetailId, CheckDraft, CheckId, CheckStatus, DiscrepancyResolution, Filter,
    FilterPatch, InventoryCheck, ItemId, PartnerId, Quantity, ResolutionAction, WarehouseId,
};
use tracing::{info, warn};

use super::{CliError, list::print_page};

#[derive(Debug, Subcommand)]
pub enum CheckAction {
    /// Show a check and its lines
    Show { id: CheckId },
    /// Create a draft check from the bins holding the given items
    Create {
        #[arg(short, long)]
        warehouse: WarehouseId,
        /// Item to count (repeatable)
        #[arg(short, long = "item", required = true)]
        items: Vec<ItemId>,
        /// Counted quantity as BIN=QTY (repeatable)
        #[arg(short, long = "count", value_parser = parse_count)]
        counts: Vec<(BinId, Quantity)>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Complete a draft check (irreversible)
    Complete { id: CheckId },
    /// Delete a draft check
    Delete { id: CheckId },
    /// List completed checks with unresolved discrepancies
    Pending {
        #[arg(short, long)]
        warehouse: Option<WarehouseId>,
    },
    /// Resolve one discrepancy line
    Resolve {
        id: CheckId,
        #[arg(long)]
        detail: CheckDetailId,
        /// `ignore`, `purchase_order` or `sales_order`
        #[arg(short, long)]
        action: ResolutionAction,
        /// Supplier or customer for the order
        #[arg(short, long)]
        partner: Option<PartnerId>,
    },
    /// Discrepancy report for a date range
    Report {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        page: Option<i64>,
    },
}

fn parse_count(s: &str) -> Result<(BinId, Quantity), String> {
    let (bin, qty) = s
        .split_once('=')
        .ok_or_else(|| format!("expected BIN=QTY, got `{s}`"))?;
    let bin = BinId::from_str(bin).map_err(|e| format!("invalid bin `{bin}`: {e}"))?;
    let qty = Decimal::from_str(qty.trim()).map_err(|e| format!("invalid quantity `{qty}`: {e}"))?;
    if qty.is_sign_negative() {
        return Err(format!("quantity cannot be negative: `{qty}`"));
    }
    Ok((bin, Quantity::new(qty)))
}

pub async fn run(client: &InventoryClient, action: CheckAction) -> Result<(), CliError> {
    let checks = client.checks();
    match action {
        CheckAction::Show { id } => {
            let check = checks.fetch(id).await.map_err(CliError::during(Operation::Fetch))?;
            print_check(&check);
        }
        CheckAction::Create {
            warehouse,
            items,
            counts,
            description,
        } => {
            let draft = build_draft(&checks, warehouse, &items, &counts, description).await?;
            let check = checks
                .create(&draft)
                .await
                .map_err(CliError::during(Operation::Create))?;
            print_check(&check);
        }
        CheckAction::Complete { id } => {
            let check = checks.fetch(id).await.map_err(CliError::during(Operation::Fetch))?;
            let check = checks
                .complete(&check)
                .await
                .map_err(CliError::during(Operation::Update))?;
            print_check(&check);
        }
        CheckAction::Delete { id } => {
            let check = checks.fetch(id).await.map_err(CliError::during(Operation::Fetch))?;
            checks
                .delete(&check)
                .await
                .map_err(CliError::during(Operation::Delete))?;
            info!(code = %check.code, "Deleted");
        }
        CheckAction::Pending { warehouse } => pending(client, warehouse).await?,
        CheckAction::Resolve {
            id,
            detail,
            action,
            partner,
        } => {
            let resolution = DiscrepancyResolution {
                detail_id: detail,
                action,
                partner_id: partner,
            };
            let check = checks.fetch(id).await.map_err(CliError::during(Operation::Fetch))?;
            let check = checks
                .resolve_discrepancy(&check, &resolution)
                .await
                .map_err(CliError::during(Operation::Update))?;
            print_check(&check);
        }
        CheckAction::Report { from, to, page } => {
            let mut patch = FilterPatch::new();
            if let Some(from) = from {
                patch = patch.set(FROM, from);
            }
            if let Some(to) = to {
                patch = patch.set(TO, to);
            }
            if let Some(page) = page {
                patch = patch.set(stocktake_core::filter::PAGE, page);
            }
            let store = FilterStore::new(client.config().default_limit, Filter::new());
            let mut report = checks.discrepancy_report(store);
            report
                .set_many(&patch)
                .wait()
                .await
                .map_err(CliError::during(Operation::Fetch))?;
            print_page(&report.snapshot())?;
        }
    }
    Ok(())
}

/// Draft one line per bin holding each item; `counts` fills in what was
/// counted, and unlisted bins stay at zero.
async fn build_draft<T: Transport>(
    checks: &CheckWorkflow<T>,
    warehouse: WarehouseId,
    items: &[ItemId],
    counts: &[(BinId, Quantity)],
    description: Option<String>,
) -> Result<CheckDraft, CliError> {
    let mut draft = CheckDraft::new(warehouse);
    draft.description = description;
    for item in items {
        checks
            .add_item(&mut draft, *item)
            .await
            .map_err(CliError::during(Operation::Fetch))?;
    }
    for (bin, qty) in counts {
        let mut matched = false;
        for line in draft.details.iter_mut().filter(|d| d.bin_id == *bin) {
            line.actual_quantity = *qty;
            matched = true;
        }
        if !matched {
            return Err(CliError::InvalidArgument(format!(
                "bin {bin} holds none of the given items in warehouse {warehouse}"
            )));
        }
    }
    Ok(draft)
}

async fn pending(client: &InventoryClient, warehouse: Option<WarehouseId>) -> Result<(), CliError> {
    let mut initial = Filter::new().with("checkStatus", CheckStatus::Completed);
    if let Some(warehouse) = warehouse {
        initial.set("warehouseId", warehouse);
    }
    let checks = client
        .engine()
        .list::<InventoryCheck>(&initial)
        .await
        .map_err(CliError::during(Operation::Fetch))?;

    let mut any = false;
    for check in checks.items.iter().filter(|c| !c.is_fully_resolved()) {
        any = true;
        info!(
            id = %check.id,
            code = %check.code,
            pending = check.pending_discrepancies().count(),
            "Awaiting resolution"
        );
    }
    if !any {
        info!("No checks awaiting resolution");
    }
    Ok(())
}

fn print_check(check: &InventoryCheck) {
    info!(
        id = %check.id,
        code = %check.code,
        warehouse = %check.warehouse_id,
        status = %check.check_status,
        "Inventory check"
    );
    for detail in &check.details {
        let bin = detail
            .bin
            .as_ref()
            .map_or_else(|| detail.bin_id.to_string(), stocktake_core::Bin::display_code);
        match detail.discrepancy() {
            Some(discrepancy) if detail.needs_resolution() => warn!(
                detail = %detail.id,
                item = %detail.item_id,
                bin = %bin,
                actual = %detail.actual_quantity,
                discrepancy = %discrepancy,
                "Unresolved discrepancy"
            ),
            Some(discrepancy) => info!(
                detail = %detail.id,
                item = %detail.item_id,
                bin = %bin,
                actual = %detail.actual_quantity,
                discrepancy = %discrepancy,
                handled = detail.discrepancy_handled,
                "Line"
            ),
            None => info!(
                detail = %detail.id,
                item = %detail.item_id,
                bin = %bin,
                actual = %detail.actual_quantity,
                "Line"
            ),
        }
    }
    if check.check_status == CheckStatus::Completed && check.is_fully_resolved() {
        info!("All discrepancies handled; the server will mark the check processed");
    }
}
