use serde::{Deserialize, Serialize};

use stockhold_core::{CartId, CustomerId, ItemId, LocationId, ReservationId, SupplierId};
use stockhold_infra::{SaleRequest, TransferRequest};
use stockhold_inventory::{Item, ItemUpdate, NewItem};

// -------------------------
// Request DTOs
// -------------------------

pub fn default_actor() -> String {
    "api".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default)]
    pub reorder_point: i64,
    pub cost_price: i64,
    pub selling_price: i64,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default = "default_actor")]
    pub performed_by: String,
}

impl CreateItemRequest {
    pub fn into_parts(self) -> (NewItem, String) {
        (
            NewItem {
                name: self.name,
                initial_stock: self.initial_stock,
                reorder_point: self.reorder_point,
                cost_price: self.cost_price,
                selling_price: self.selling_price,
                supplier_id: self.supplier_id,
            },
            self.performed_by,
        )
    }
}

pub type UpdateItemRequest = ItemUpdate;

#[derive(Debug, Deserialize)]
pub struct IntakeRequest {
    pub quantity: i64,
    #[serde(default = "default_actor")]
    pub performed_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    #[serde(default = "default_actor")]
    pub performed_by: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    pub cart_id: CartId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReservationRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReservationListQuery {
    pub cart_id: Option<CartId>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    /// Rebuild from the ledger instead of reading the maintained copy.
    #[serde(default)]
    pub replay: bool,
}

/// One line of `POST /orders/:order_id/sales`; the order id comes from the path.
#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
    #[serde(default)]
    pub unit_price: Option<i64>,
    #[serde(default = "default_actor")]
    pub performed_by: String,
}

impl SaleLineRequest {
    pub fn into_sale(self, order_id: stockhold_core::OrderId) -> SaleRequest {
        let mut sale = SaleRequest::new(self.item_id, self.quantity, order_id).performed_by(self.performed_by);
        if let Some(customer) = self.customer_id {
            sale = sale.with_customer(customer);
        }
        if let Some(reservation) = self.reservation_id {
            sale = sale.with_reservation(reservation);
        }
        if let Some(price) = self.unit_price {
            sale = sale.with_unit_price(price);
        }
        sale
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderRequest {
    pub lines: Vec<SaleLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    pub from_location: LocationId,
    pub to_location: LocationId,
    #[serde(default = "default_actor")]
    pub requested_by: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl From<CreateTransferRequest> for TransferRequest {
    fn from(value: CreateTransferRequest) -> Self {
        TransferRequest {
            item_id: value.item_id,
            quantity: value.quantity,
            from_location: value.from_location,
            to_location: value.to_location,
            requested_by: value.requested_by,
            notes: value.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteTransferRequest {
    #[serde(default = "default_actor")]
    pub performed_by: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelTransferRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// Catalog record plus live availability.
#[derive(Debug, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub available_to_sell: i64,
    pub low_stock: bool,
}

impl ItemView {
    pub fn new(item: Item, available_to_sell: i64) -> Self {
        let low_stock = item.is_low_stock();
        Self {
            item,
            available_to_sell,
            low_stock,
        }
    }
}
