//! Typed schemas for backend entities.
//!
//! These are the shapes the client validates at the network boundary. Only
//! the fields the client reads are required; everything else is optional so
//! that additive backend changes do not break decoding.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{
    BinId, Endpoint, EntityStatus, ItemId, PartnerId, PartnerType, Quantity, StockId, WarehouseId,
};

/// An entity served from a collection endpoint.
pub trait Resource: DeserializeOwned + Send + Sync + 'static {
    /// Collection path, e.g. `/items`.
    const PATH: &'static str;

    #[must_use]
    fn endpoint() -> Endpoint {
        Endpoint::from_static(Self::PATH)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub status: Option<EntityStatus>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource for Warehouse {
    const PATH: &'static str = "/warehouses";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub base_unit_id: Option<i64>,
    pub unit_price: Option<Quantity>,
    pub status: Option<EntityStatus>,
}

impl Resource for Item {
    const PATH: &'static str = "/items";
}

/// A storage location inside a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bin {
    pub id: BinId,
    pub code: Option<String>,
    pub location_code: Option<String>,
    pub warehouse_id: Option<WarehouseId>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_receiving_bin: bool,
}

impl Bin {
    /// Display code: `code`, then `locationCode`, then `Bin {id}`.
    #[must_use]
    pub fn display_code(&self) -> String {
        [self.code.as_deref(), self.location_code.as_deref()]
            .into_iter()
            .flatten()
            .find(|c| !c.is_empty())
            .map_or_else(|| format!("Bin {}", self.id), str::to_owned)
    }
}

impl Resource for Bin {
    const PATH: &'static str = "/bins";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: PartnerId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub partner_type: Option<PartnerType>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<EntityStatus>,
}

impl Resource for Partner {
    const PATH: &'static str = "/partners";
}

/// Stock of one item, optionally pinned to a bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStock {
    pub id: Option<StockId>,
    pub item_id: ItemId,
    pub warehouse_id: Option<WarehouseId>,
    pub bin_id: Option<BinId>,
    pub bin: Option<Bin>,
    pub quantity: Option<Quantity>,
    pub reserved_quantity: Option<Quantity>,
    pub available_quantity: Option<Quantity>,
}

impl Resource for InventoryStock {
    const PATH: &'static str = "/inventory-stock";
}

/// A row of the inventory-check discrepancy report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancyReportRow {
    pub item_code: String,
    pub item_name: Option<String>,
    pub warehouse_code: Option<String>,
    pub bin_code: Option<String>,
    pub actual_quantity: Option<Quantity>,
    pub discrepancy: Option<Quantity>,
}

impl Resource for DiscrepancyReportRow {
    const PATH: &'static str = "/reports/inventory-check-discrepancy";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_bin_display_code_fallbacks() {
        let mut bin: Bin = serde_json::from_value(json!({"id": 9, "locationCode": "A-01"})).unwrap();
        assert_eq!(bin.display_code(), "A-01");
        bin.code = Some("B-02".into());
        assert_eq!(bin.display_code(), "B-02");
        bin.code = Some(String::new());
        assert_eq!(bin.display_code(), "A-01");
        bin.code = None;
        bin.location_code = None;
        assert_eq!(bin.display_code(), "Bin 9");
    }

    #[test]
    fn test_stock_row_decodes_from_backend_shape() {
        let stock: InventoryStock = serde_json::from_value(json!({
            "id": 1,
            "itemId": 5,
            "warehouseId": 2,
            "binId": 9,
            "bin": {"id": 9, "code": "A-01"},
            "quantity": 10,
            "reservedQuantity": 0,
            "availableQuantity": 10
        }))
        .unwrap();
        assert_eq!(stock.quantity, Some(Quantity::from(10)));
        assert_eq!(stock.bin.unwrap().display_code(), "A-01");
    }

    #[test]
    fn test_partner_type_field_name() {
        let partner: Partner = serde_json::from_value(json!({
            "id": 5, "code": "SUP-1", "name": "Acme", "type": "supplier"
        }))
        .unwrap();
        assert_eq!(partner.partner_type, Some(PartnerType::Supplier));
    }
}
