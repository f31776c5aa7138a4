//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an inventory check.
///
/// Transitions are linear: `Draft -> Completed -> Processed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Counts are being entered; the check can still be edited or deleted.
    #[default]
    Draft,
    /// Book quantities have been snapshotted; discrepancies await handling.
    Completed,
    /// Every discrepancy has been handled.
    Processed,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Completed => write!(f, "completed"),
            Self::Processed => write!(f, "processed"),
        }
    }
}

impl std::str::FromStr for CheckStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "completed" => Ok(Self::Completed),
            "processed" => Ok(Self::Processed),
            _ => Err(format!("invalid check status: {s}")),
        }
    }
}

/// Active/inactive flag used for logical deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    #[default]
    Active,
    Inactive,
}

impl EntityStatus {
    /// Wire value, also used as the `status` filter value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading partner role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerType {
    Supplier,
    Customer,
    Both,
}

/// Corrective action applied to a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    /// Accept the counted quantity without a follow-up order.
    Ignore,
    /// Raise a purchase order, normally to cover a shortage.
    PurchaseOrder,
    /// Raise a sales order, normally to dispose of a surplus.
    SalesOrder,
}

impl ResolutionAction {
    /// Whether this action creates an order and therefore needs a partner.
    #[must_use]
    pub const fn creates_order(&self) -> bool {
        matches!(self, Self::PurchaseOrder | Self::SalesOrder)
    }
}

impl std::fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::PurchaseOrder => write!(f, "purchase_order"),
            Self::SalesOrder => write!(f, "sales_order"),
        }
    }
}

impl std::str::FromStr for ResolutionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "purchase_order" => Ok(Self::PurchaseOrder),
            "sales_order" => Ok(Self::SalesOrder),
            _ => Err(format!("invalid resolution action: {s}")),
        }
    }
}

/// How strictly resolution actions are matched to the discrepancy sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResolutionPolicy {
    /// Purchase orders only for shortages, sales orders only for surpluses.
    #[default]
    Strict,
    /// Any order type for any non-zero discrepancy.
    Permissive,
}

impl std::str::FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(format!("invalid resolution policy: {s}")),
        }
    }
}
