//! Cross-domain services that hang off a consultation: prescriptions, pharmacy orders, lab
//! requests, the electronic medical record and payments.
//!
//! Each operation is one store transaction. Side-effects on other records (the parent
//! appointment's status, stock levels, a lab recommendation's completion) happen inside
//! that same transaction, so a failure anywhere leaves nothing behind.

mod emr;
mod lab;
mod payment;
mod pharmacy;
mod prescription;

pub use emr::{EmrService, HistoryEntry, NewEmr, NewVitals};
pub use lab::{LabService, NewLabReport};
pub use payment::{NewPayment, PaymentService};
pub use pharmacy::{OrderOutcome, OrderUpdate, PharmacyService, SkippedLine};
pub use prescription::{
    NewPrescription, PrescribedMedicine, PrescriptionDetail, PrescriptionService,
    RecommendedTest,
};

use crate::store::Tables;
use crate::{CareError, CareResult};
use carelink_ids::InvoiceNumber;
use chrono::NaiveDate;

const INVOICE_NUMBER_ATTEMPTS: usize = 100;

/// Draws a random invoice number that is not yet used by either invoice table.
pub(crate) fn unique_invoice_number(
    tables: &Tables,
    issued_on: NaiveDate,
) -> CareResult<InvoiceNumber> {
    let taken = |candidate: &InvoiceNumber| {
        tables
            .pharmacy_invoices
            .values()
            .any(|i| &i.invoice_number == candidate)
            || tables
                .payment_invoices
                .values()
                .any(|i| &i.invoice_number == candidate)
    };
    std::iter::repeat_with(|| InvoiceNumber::generate(issued_on))
        .take(INVOICE_NUMBER_ATTEMPTS)
        .find(|candidate| !taken(candidate))
        .ok_or_else(|| CareError::conflict(format!("no free invoice numbers left for {issued_on}")))
}
