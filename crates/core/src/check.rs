//! Inventory checks and their reconciliation state machine.
//!
//! A check moves `draft -> completed -> processed` and never back:
//!
//! - **draft**: counted quantities are entered; the check may be edited or
//!   deleted.
//! - **completed**: the server has snapshotted book quantities and computed
//!   `discrepancy = actual - book` per line. Read-only from here on.
//! - **processed**: every non-zero discrepancy has been handled. The server
//!   performs this transition; the client never assumes it.
//!
//! The guards in this module are evaluated before a request is sent. The
//! server remains the authority and may still reject a transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::{Bin, InventoryStock, Resource};
use crate::types::{
    BinId, CheckDetailId, CheckId, CheckStatus, ItemId, PartnerId, Quantity, ResolutionAction,
    ResolutionPolicy, UserId, WarehouseId,
};

/// Rejections raised by the check state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    #[error("Cannot edit completed check {code} (status: {status})")]
    CannotEditCompletedCheck { code: String, status: CheckStatus },

    #[error("Cannot delete check {code} (status: {status})")]
    CannotDeleteCheck { code: String, status: CheckStatus },

    #[error("Check {code} cannot be completed from status {status}")]
    CannotComplete { code: String, status: CheckStatus },

    #[error("Discrepancies on check {code} can only be resolved once completed (status: {status})")]
    NotCompleted { code: String, status: CheckStatus },

    #[error("Check has no detail {0}")]
    UnknownDetail(CheckDetailId),

    #[error("Detail {0} has no discrepancy to resolve")]
    NoDiscrepancy(CheckDetailId),

    #[error("Discrepancy on detail {0} has already been handled")]
    AlreadyHandled(CheckDetailId),

    #[error("Action {0} requires a partner")]
    PartnerRequired(ResolutionAction),

    #[error("Action {action} does not match a {kind} on detail {detail}")]
    ActionMismatch {
        detail: CheckDetailId,
        action: ResolutionAction,
        kind: DiscrepancyKind,
    },

    #[error("A check needs at least one detail line")]
    EmptyDraft,

    #[error("No bins hold stock for item {item} in warehouse {warehouse}")]
    NoCandidateBins { item: ItemId, warehouse: WarehouseId },
}

impl CheckError {
    /// Whether the rejection stems from the check's current state rather
    /// than from malformed input.
    #[must_use]
    pub const fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            Self::CannotEditCompletedCheck { .. }
                | Self::CannotDeleteCheck { .. }
                | Self::CannotComplete { .. }
                | Self::NotCompleted { .. }
                | Self::AlreadyHandled(_)
        )
    }
}

/// Sign of a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscrepancyKind {
    None,
    /// More on hand than booked.
    Surplus,
    /// Less on hand than booked.
    Shortage,
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "no discrepancy"),
            Self::Surplus => write!(f, "surplus"),
            Self::Shortage => write!(f, "shortage"),
        }
    }
}

impl From<Quantity> for DiscrepancyKind {
    fn from(value: Quantity) -> Self {
        if value.is_positive() {
            Self::Surplus
        } else if value.is_negative() {
            Self::Shortage
        } else {
            Self::None
        }
    }
}

/// One counted line of a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDetail {
    pub id: CheckDetailId,
    pub item_id: ItemId,
    pub bin_id: BinId,
    pub bin: Option<Bin>,
    /// Filled by the server at completion time.
    pub book_quantity: Option<Quantity>,
    pub actual_quantity: Quantity,
    /// Filled by the server at completion time.
    pub discrepancy: Option<Quantity>,
    #[serde(default)]
    pub discrepancy_handled: bool,
}

impl CheckDetail {
    /// Signed `actual - book`, once known.
    ///
    /// Prefers the server's figure and falls back to computing it.
    #[must_use]
    pub fn discrepancy(&self) -> Option<Quantity> {
        self.discrepancy
            .or_else(|| self.book_quantity.map(|book| self.actual_quantity - book))
    }

    #[must_use]
    pub fn kind(&self) -> DiscrepancyKind {
        self.discrepancy().map_or(DiscrepancyKind::None, DiscrepancyKind::from)
    }

    /// Non-zero and not yet handled.
    #[must_use]
    pub fn needs_resolution(&self) -> bool {
        self.kind() != DiscrepancyKind::None && !self.discrepancy_handled
    }
}

/// An inventory check as returned by `GET /inventory-checks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryCheck {
    pub id: CheckId,
    pub code: String,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub warehouse_id: WarehouseId,
    pub checker_id: Option<UserId>,
    pub description: Option<String>,
    pub check_status: CheckStatus,
    #[serde(default)]
    pub details: Vec<CheckDetail>,
}

impl Resource for InventoryCheck {
    const PATH: &'static str = "/inventory-checks";
}

impl InventoryCheck {
    /// Wrapper key used by the detail endpoint.
    pub const WRAPPER: &'static str = "inventoryCheck";

    /// Edits are only allowed while in draft.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::CannotEditCompletedCheck`] otherwise.
    pub fn ensure_editable(&self) -> Result<(), CheckError> {
        if self.check_status == CheckStatus::Draft {
            Ok(())
        } else {
            Err(CheckError::CannotEditCompletedCheck {
                code: self.code.clone(),
                status: self.check_status,
            })
        }
    }

    /// # Errors
    ///
    /// Returns [`CheckError::CannotDeleteCheck`] unless in draft.
    pub fn ensure_deletable(&self) -> Result<(), CheckError> {
        if self.check_status == CheckStatus::Draft {
            Ok(())
        } else {
            Err(CheckError::CannotDeleteCheck {
                code: self.code.clone(),
                status: self.check_status,
            })
        }
    }

    /// # Errors
    ///
    /// Returns [`CheckError::CannotComplete`] unless in draft.
    pub fn ensure_completable(&self) -> Result<(), CheckError> {
        if self.check_status == CheckStatus::Draft {
            Ok(())
        } else {
            Err(CheckError::CannotComplete {
                code: self.code.clone(),
                status: self.check_status,
            })
        }
    }

    #[must_use]
    pub fn detail(&self, id: CheckDetailId) -> Option<&CheckDetail> {
        self.details.iter().find(|d| d.id == id)
    }

    /// Validate a resolution against the current state of the check.
    ///
    /// # Errors
    ///
    /// Rejects when the check is not completed, the detail is unknown, has
    /// no discrepancy, or was already handled; when an order action lacks a
    /// partner; and, under [`ResolutionPolicy::Strict`], when the order type
    /// does not match the sign of the discrepancy.
    pub fn ensure_resolvable(
        &self,
        resolution: &DiscrepancyResolution,
        policy: ResolutionPolicy,
    ) -> Result<&CheckDetail, CheckError> {
        if self.check_status != CheckStatus::Completed {
            return Err(CheckError::NotCompleted {
                code: self.code.clone(),
                status: self.check_status,
            });
        }
        let detail = self
            .detail(resolution.detail_id)
            .ok_or(CheckError::UnknownDetail(resolution.detail_id))?;
        let kind = detail.kind();
        if kind == DiscrepancyKind::None {
            return Err(CheckError::NoDiscrepancy(detail.id));
        }
        if detail.discrepancy_handled {
            return Err(CheckError::AlreadyHandled(detail.id));
        }
        if resolution.action.creates_order() && resolution.partner_id.is_none() {
            return Err(CheckError::PartnerRequired(resolution.action));
        }
        if policy == ResolutionPolicy::Strict {
            let matches = match resolution.action {
                ResolutionAction::Ignore => true,
                ResolutionAction::PurchaseOrder => kind == DiscrepancyKind::Shortage,
                ResolutionAction::SalesOrder => kind == DiscrepancyKind::Surplus,
            };
            if !matches {
                return Err(CheckError::ActionMismatch {
                    detail: detail.id,
                    action: resolution.action,
                    kind,
                });
            }
        }
        Ok(detail)
    }

    /// Lines still waiting for a resolution. Zero discrepancies never appear.
    pub fn pending_discrepancies(&self) -> impl Iterator<Item = &CheckDetail> {
        self.details.iter().filter(|d| d.needs_resolution())
    }

    /// Completed (or processed) with nothing left to resolve.
    #[must_use]
    pub fn is_fully_resolved(&self) -> bool {
        self.check_status != CheckStatus::Draft && self.pending_discrepancies().next().is_none()
    }
}

/// A corrective action for one discrepancy line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscrepancyResolution {
    pub detail_id: CheckDetailId,
    pub action: ResolutionAction,
    pub partner_id: Option<PartnerId>,
}

impl DiscrepancyResolution {
    #[must_use]
    pub const fn ignore(detail_id: CheckDetailId) -> Self {
        Self {
            detail_id,
            action: ResolutionAction::Ignore,
            partner_id: None,
        }
    }

    #[must_use]
    pub const fn purchase_order(detail_id: CheckDetailId, partner_id: PartnerId) -> Self {
        Self {
            detail_id,
            action: ResolutionAction::PurchaseOrder,
            partner_id: Some(partner_id),
        }
    }

    #[must_use]
    pub const fn sales_order(detail_id: CheckDetailId, partner_id: PartnerId) -> Self {
        Self {
            detail_id,
            action: ResolutionAction::SalesOrder,
            partner_id: Some(partner_id),
        }
    }

    /// Request body for `POST /inventory-checks/process-discrepancy`.
    ///
    /// The partner is only sent for order-creating actions.
    #[must_use]
    pub fn to_request(&self) -> ProcessDiscrepancyRequest {
        ProcessDiscrepancyRequest {
            detail_id: self.detail_id,
            action: self.action,
            create_order_request: self
                .partner_id
                .filter(|_| self.action.creates_order())
                .map(|partner_id| CreateOrderRequest { partner_id }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDiscrepancyRequest {
    pub detail_id: CheckDetailId,
    pub action: ResolutionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_order_request: Option<CreateOrderRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub partner_id: PartnerId,
}

/// A bin proposed for counting, derived from current stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBin {
    pub bin_id: BinId,
    pub bin_code: String,
    pub current_stock: Quantity,
    /// What the user counted; starts at zero.
    pub actual_quantity: Quantity,
}

impl CandidateBin {
    /// Build from a stock row; rows without a bin are skipped.
    #[must_use]
    pub fn from_stock(stock: &InventoryStock) -> Option<Self> {
        let bin_id = stock.bin_id.or_else(|| stock.bin.as_ref().map(|b| b.id))?;
        let bin_code = stock
            .bin
            .as_ref()
            .map_or_else(|| format!("Bin {bin_id}"), Bin::display_code);
        Some(Self {
            bin_id,
            bin_code,
            current_stock: stock.quantity.unwrap_or_default(),
            actual_quantity: Quantity::ZERO,
        })
    }
}

/// One line of a draft payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftDetail {
    pub item_id: ItemId,
    pub bin_id: BinId,
    pub actual_quantity: Quantity,
}

/// Create/update payload for an inventory check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<DateTime<Utc>>,
    pub warehouse_id: WarehouseId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub details: Vec<DraftDetail>,
}

impl CheckDraft {
    #[must_use]
    pub const fn new(warehouse_id: WarehouseId) -> Self {
        Self {
            from_date: None,
            to_date: None,
            warehouse_id,
            description: None,
            details: Vec::new(),
        }
    }

    /// Pre-populate an edit form from an existing check.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::CannotEditCompletedCheck`] unless the check is a
    /// draft.
    pub fn from_check(check: &InventoryCheck) -> Result<Self, CheckError> {
        check.ensure_editable()?;
        Ok(Self {
            from_date: check.from_date,
            to_date: check.to_date,
            warehouse_id: check.warehouse_id,
            description: check.description.clone(),
            details: check
                .details
                .iter()
                .map(|d| DraftDetail {
                    item_id: d.item_id,
                    bin_id: d.bin_id,
                    actual_quantity: d.actual_quantity,
                })
                .collect(),
        })
    }

    /// Append one line per candidate bin for `item_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::NoCandidateBins`] if `bins` is empty.
    pub fn add_item(&mut self, item_id: ItemId, bins: &[CandidateBin]) -> Result<usize, CheckError> {
        if bins.is_empty() {
            return Err(CheckError::NoCandidateBins {
                item: item_id,
                warehouse: self.warehouse_id,
            });
        }
        self.details.extend(bins.iter().map(|bin| DraftDetail {
            item_id,
            bin_id: bin.bin_id,
            actual_quantity: bin.actual_quantity,
        }));
        Ok(bins.len())
    }

    /// Remove a line by position.
    pub fn remove_detail(&mut self, index: usize) -> Option<DraftDetail> {
        (index < self.details.len()).then(|| self.details.remove(index))
    }

    /// # Errors
    ///
    /// Returns [`CheckError::EmptyDraft`] when there are no lines.
    pub fn validate(&self) -> Result<(), CheckError> {
        if self.details.is_empty() {
            return Err(CheckError::EmptyDraft);
        }
        Ok(())
    }
}
