//! Live inventory-check workflow tests.
//!
//! These tests require:
//! - A running inventory backend
//! - `STOCKTAKE_TEST_WAREHOUSE_ID` / `STOCKTAKE_TEST_ITEM_ID` naming an item
//!   with stock in at least one bin of that warehouse
//!
//! Run with: cargo test -p stocktake-integration-tests -- --ignored

use rust_decimal::Decimal;
use stocktake_client::ClientError;
use stocktake_core::{CheckDraft, CheckError, CheckStatus, DiscrepancyResolution, Quantity};
use stocktake_integration_tests::{fixture_ids, test_client};

/// Draft a check counting the fixture item with one unit off in its first bin.
async fn create_draft(client: &stocktake_client::InventoryClient) -> stocktake_core::InventoryCheck {
    let (warehouse, item) = fixture_ids();
    let checks = client.checks();
    let mut draft = CheckDraft::new(warehouse);
    draft.description = Some("integration test".to_string());
    let bins = checks
        .candidate_bins(item, warehouse)
        .await
        .expect("Stock lookup failed");
    draft.add_item(item, &bins).expect("Item has no bins");
    for (line, bin) in draft.details.iter_mut().zip(&bins) {
        line.actual_quantity = bin.current_stock;
    }
    if let (Some(line), Some(bin)) = (draft.details.first_mut(), bins.first()) {
        line.actual_quantity = Quantity::new(bin.current_stock.value() + Decimal::ONE);
    }
    checks.create(&draft).await.expect("Create failed")
}

#[tokio::test]
#[ignore = "Requires running inventory backend with stock fixtures"]
async fn test_draft_can_be_edited_and_deleted() {
    let client = test_client().await.expect("Failed to build client");
    let checks = client.checks();
    let check = create_draft(&client).await;
    assert_eq!(check.check_status, CheckStatus::Draft);

    let mut draft = checks.begin_edit(&check).expect("Draft should be editable");
    draft.description = Some("edited".to_string());
    let edited = checks.edit(&check, &draft).await.expect("Edit failed");
    assert_eq!(edited.description.as_deref(), Some("edited"));

    checks.delete(&edited).await.expect("Delete failed");
}

#[tokio::test]
#[ignore = "Requires running inventory backend with stock fixtures"]
async fn test_complete_then_resolve_surplus() {
    let client = test_client().await.expect("Failed to build client");
    let checks = client.checks();
    let draft = create_draft(&client).await;

    let completed = checks.complete(&draft).await.expect("Complete failed");
    assert_eq!(completed.check_status, CheckStatus::Completed);
    assert!(matches!(
        checks.begin_edit(&completed),
        Err(ClientError::Check(CheckError::CannotEditCompletedCheck { .. }))
    ));

    let pending: Vec<_> = completed.pending_discrepancies().map(|d| d.id).collect();
    assert!(!pending.is_empty(), "the surplus line should be pending");

    let mut check = completed;
    for detail in pending {
        check = checks
            .resolve_discrepancy(&check, &DiscrepancyResolution::ignore(detail))
            .await
            .expect("Resolve failed");
    }
    assert!(check.is_fully_resolved());

    let first = check.details.first().expect("check has lines").id;
    let again = checks
        .resolve_discrepancy(&check, &DiscrepancyResolution::ignore(first))
        .await;
    assert!(again.is_err());
}
