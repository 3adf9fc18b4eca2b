use carelink_ids::{InvoiceNumber, RecordId};
use carelink_types::{Money, NonEmptyText};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: RecordId,
    pub admin: RecordId,
    pub name: NonEmptyText,
    pub city: String,
    pub is_active: bool,
    pub is_approved: bool,
}

/// A pharmacy's stock row for one catalog medicine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacyMedicine {
    pub id: RecordId,
    pub pharmacy: RecordId,
    pub medicine: RecordId,
    pub stock_quantity: u32,
    pub price_per_unit: Money,
    pub is_available: bool,
}

impl PharmacyMedicine {
    pub fn can_supply(&self, quantity: u32) -> bool {
        self.is_available && self.stock_quantity >= quantity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Ready,
    Dispatched,
    Completed,
    Cancelled,
}

wire_enum!(OrderStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Ready => "READY",
    Dispatched => "DISPATCHED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacyOrder {
    pub id: RecordId,
    pub prescription: RecordId,
    pub pharmacy: RecordId,
    pub patient: RecordId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacyOrderItem {
    pub id: RecordId,
    pub order: RecordId,
    pub prescription_medicine: RecordId,
    pub pharmacy_medicine: RecordId,
    pub quantity: u32,
    pub unit_price: Money,
    /// Always `unit_price × quantity`.
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacyInvoice {
    pub id: RecordId,
    pub order: RecordId,
    pub invoice_number: InvoiceNumber,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub issued_at: DateTime<Utc>,
}
