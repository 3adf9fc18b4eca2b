use carelink_ids::{InvoiceNumber, RecordId, TransactionId};
use carelink_types::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Consultation,
    LabTest,
    Pharmacy,
    BedCharge,
    OtCharge,
}

wire_enum!(PaymentType {
    Consultation => "CONSULTATION",
    LabTest => "LAB_TEST",
    Pharmacy => "PHARMACY",
    BedCharge => "BED_CHARGE",
    OtCharge => "OT_CHARGE",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Upi,
    Card,
    NetBanking,
    Cash,
    Wallet,
}

wire_enum!(PaymentMethod {
    Upi => "UPI",
    Card => "CARD",
    NetBanking => "NET_BANKING",
    Cash => "CASH",
    Wallet => "WALLET",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

wire_enum!(PaymentStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Completed => "COMPLETED",
    Failed => "FAILED",
    Refunded => "REFUNDED",
    PartiallyRefunded => "PARTIALLY_REFUNDED",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: RecordId,
    pub payer: RecordId,
    pub hospital: Option<RecordId>,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub platform_commission: Money,
    /// `amount - platform_commission`.
    pub hospital_amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub appointment: Option<RecordId>,
    pub pharmacy_order: Option<RecordId>,
    pub lab_request: Option<RecordId>,
    pub transaction_id: TransactionId,
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInvoice {
    pub id: RecordId,
    pub payment: RecordId,
    pub invoice_number: InvoiceNumber,
    pub subtotal: Money,
    pub tax: Money,
    pub platform_commission: Money,
    pub total: Money,
    pub issued_at: DateTime<Utc>,
}
