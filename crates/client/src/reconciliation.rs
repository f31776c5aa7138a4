//! Inventory-check workflow.
//!
//! Drives a check through `draft -> completed -> processed` against the
//! backend. Every transition is guarded locally first (see
//! [`stocktake_core::check`]) so a rejected transition never reaches the
//! network; the server still has the final word. After each successful
//! transition the check is read back, since the server computes book
//! quantities, discrepancies and the processed state.

use std::fmt;

use stocktake_core::check::ProcessDiscrepancyRequest;
use stocktake_core::query::decode_entity;
use stocktake_core::{
    CandidateBin, CheckDraft, CheckId, DiscrepancyReportRow, DiscrepancyResolution, Endpoint,
    Filter, InventoryCheck, InventoryStock, ItemId, ResolutionPolicy, Resource, WarehouseId,
};
use tracing::{info, instrument};

use crate::engine::QueryEngine;
use crate::error::ClientError;
use crate::filter_store::FilterStore;
use crate::list_view::FilteredList;
use crate::mutation::MutationGateway;
use crate::transport::Transport;

const STOCK_LOOKUP_PATH: &str = "/inventory-stock/filter";
const PROCESS_DISCREPANCY: &str = "process-discrepancy";

pub struct CheckWorkflow<T: Transport> {
    engine: QueryEngine<T>,
    gateway: MutationGateway<T>,
    policy: ResolutionPolicy,
    checks: Endpoint,
}

impl<T: Transport> fmt::Debug for CheckWorkflow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckWorkflow")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> CheckWorkflow<T> {
    #[must_use]
    pub fn new(engine: QueryEngine<T>, gateway: MutationGateway<T>, policy: ResolutionPolicy) -> Self {
        Self {
            engine,
            gateway,
            policy,
            checks: InventoryCheck::endpoint(),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// List view over inventory checks, e.g. filtered by `checkStatus`.
    #[must_use]
    pub fn list(&self, store: FilterStore) -> FilteredList<T> {
        FilteredList::new(self.engine.clone(), self.checks.clone(), store)
    }

    /// List view over the discrepancy report (`from`, `to`, `page`, `limit`).
    #[must_use]
    pub fn discrepancy_report(&self, store: FilterStore) -> FilteredList<T> {
        FilteredList::new(self.engine.clone(), DiscrepancyReportRow::endpoint(), store)
    }

    /// `GET /inventory-checks/{id}`, unwrapping `{ inventoryCheck }`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a check.
    pub async fn fetch(&self, id: CheckId) -> Result<InventoryCheck, ClientError> {
        self.engine
            .get_one(&self.checks, id, Some(InventoryCheck::WRAPPER))
            .await
    }

    /// Bins currently holding `item` in `warehouse`, as draft candidates.
    ///
    /// Stock rows without a bin are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the stock lookup fails.
    #[instrument(skip(self))]
    pub async fn candidate_bins(
        &self,
        item: ItemId,
        warehouse: WarehouseId,
    ) -> Result<Vec<CandidateBin>, ClientError> {
        let filter = Filter::new().with("itemId", item).with("warehouseId", warehouse);
        let page = self
            .engine
            .fetch(&Endpoint::from_static(STOCK_LOOKUP_PATH), &filter)
            .await?;
        let stock = page.decode::<InventoryStock>()?;
        Ok(stock.items.iter().filter_map(CandidateBin::from_stock).collect())
    }

    /// Look up candidate bins for `item` and append one draft line per bin.
    ///
    /// Returns how many lines were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or no bin holds the item.
    pub async fn add_item(&self, draft: &mut CheckDraft, item: ItemId) -> Result<usize, ClientError> {
        let bins = self.candidate_bins(item, draft.warehouse_id).await?;
        Ok(draft.add_item(item, &bins)?)
    }

    /// Submit a new check. It starts in draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft has no lines or the server rejects it.
    #[instrument(skip_all, fields(warehouse = %draft.warehouse_id, lines = draft.details.len()))]
    pub async fn create(&self, draft: &CheckDraft) -> Result<InventoryCheck, ClientError> {
        draft.validate()?;
        let body = self.gateway.create(&self.checks, draft).await?;
        let check: InventoryCheck = decode_entity(body, Some(InventoryCheck::WRAPPER))?;
        info!(code = %check.code, "Created inventory check");
        Ok(check)
    }

    /// Open a draft for editing.
    ///
    /// # Errors
    ///
    /// Returns [`stocktake_core::CheckError::CannotEditCompletedCheck`] unless
    /// the check is a draft.
    pub fn begin_edit(&self, check: &InventoryCheck) -> Result<CheckDraft, ClientError> {
        Ok(CheckDraft::from_check(check)?)
    }

    /// Replace a draft's header and lines.
    ///
    /// # Errors
    ///
    /// Rejects non-draft checks and empty drafts before sending anything.
    #[instrument(skip_all, fields(code = %check.code))]
    pub async fn edit(&self, check: &InventoryCheck, draft: &CheckDraft) -> Result<InventoryCheck, ClientError> {
        check.ensure_editable()?;
        draft.validate()?;
        self.gateway.update(&self.checks, check.id, draft).await?;
        self.fetch(check.id).await
    }

    /// Complete a draft. The server snapshots book quantities and computes
    /// discrepancies; the returned check carries them. Irreversible.
    ///
    /// # Errors
    ///
    /// Rejects non-draft checks before sending anything.
    #[instrument(skip_all, fields(code = %check.code))]
    pub async fn complete(&self, check: &InventoryCheck) -> Result<InventoryCheck, ClientError> {
        check.ensure_completable()?;
        self.gateway
            .post_action(&self.checks, &format!("{}/complete", check.id), None)
            .await?;
        let completed = self.fetch(check.id).await?;
        info!(
            pending = completed.pending_discrepancies().count(),
            "Completed inventory check"
        );
        Ok(completed)
    }

    /// Apply a corrective action to one discrepancy line.
    ///
    /// # Errors
    ///
    /// Rejects the resolution locally when the check is not completed, the
    /// line has no discrepancy or was already handled, a partner is missing,
    /// or (under the strict policy) the order type does not fit the sign.
    #[instrument(skip_all, fields(code = %check.code, detail = %resolution.detail_id, action = %resolution.action))]
    pub async fn resolve_discrepancy(
        &self,
        check: &InventoryCheck,
        resolution: &DiscrepancyResolution,
    ) -> Result<InventoryCheck, ClientError> {
        check.ensure_resolvable(resolution, self.policy)?;
        let request: ProcessDiscrepancyRequest = resolution.to_request();
        let body = serde_json::to_value(&request)?;
        self.gateway
            .post_action(&self.checks, PROCESS_DISCREPANCY, Some(body))
            .await?;
        let updated = self.fetch(check.id).await?;
        info!(
            status = %updated.check_status,
            pending = updated.pending_discrepancies().count(),
            "Resolved discrepancy"
        );
        Ok(updated)
    }

    /// Delete a draft.
    ///
    /// # Errors
    ///
    /// Rejects non-draft checks before sending anything.
    #[instrument(skip_all, fields(code = %check.code))]
    pub async fn delete(&self, check: &InventoryCheck) -> Result<(), ClientError> {
        check.ensure_deletable()?;
        self.gateway.remove(&self.checks, check.id).await?;
        Ok(())
    }
}
