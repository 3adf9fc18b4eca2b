//! Pharmacy orders filled from a prescription against one pharmacy's stock.

use super::unique_invoice_number;
use crate::audit::AuditEvent;
use crate::constants::resource;
use crate::identity::Actor;
use crate::model::{
    OrderStatus, PharmacyInvoice, PharmacyOrder, PharmacyOrderItem, PrescriptionMedicine,
};
use crate::notify::{NotificationCategory, NotificationRequest};
use crate::policy::{authorize, AccessScope, Operation};
use crate::store::{TableExt, Tables};
use crate::workflow::finance::tax_on;
use crate::workflow::transitions::check_transition;
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::RecordId;
use carelink_types::{Money, Percentage};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A prescription line the pharmacy could not fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub medicine: RecordId,
    pub requested: u32,
    /// Best available stock for the medicine at this pharmacy (0 if none is listed).
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub order: PharmacyOrder,
    pub items: Vec<PharmacyOrderItem>,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub order: PharmacyOrder,
    /// Issued when the order reaches Completed.
    pub invoice: Option<PharmacyInvoice>,
}

fn match_line(
    tables: &Tables,
    pharmacy: RecordId,
    line: &PrescriptionMedicine,
) -> Result<(RecordId, Money), SkippedLine> {
    let rows = tables
        .pharmacy_stock
        .values()
        .filter(|s| s.pharmacy == pharmacy && s.medicine == line.medicine);
    if let Some(stock) = rows.clone().find(|s| s.can_supply(line.quantity)) {
        return Ok((stock.id, stock.price_per_unit));
    }
    Err(SkippedLine {
        medicine: line.medicine,
        requested: line.quantity,
        available: rows
            .filter(|s| s.is_available)
            .map(|s| s.stock_quantity)
            .max()
            .unwrap_or(0),
    })
}

/// Applies the Completed side-effects: stock leaves the shelf and an invoice is issued.
fn complete_order(
    tables: &mut Tables,
    order: &PharmacyOrder,
    tax_rate: Percentage,
    now: DateTime<Utc>,
) -> CareResult<PharmacyInvoice> {
    let items: Vec<PharmacyOrderItem> = tables
        .pharmacy_order_items
        .values()
        .filter(|i| i.order == order.id)
        .cloned()
        .collect();
    for item in &items {
        let stock = tables.pharmacy_stock.fetch_mut(item.pharmacy_medicine)?;
        let Some(left) = stock.stock_quantity.checked_sub(item.quantity) else {
            return Err(CareError::conflict(format!(
                "insufficient stock for medicine {}: {} left, {} ordered",
                stock.medicine, stock.stock_quantity, item.quantity
            )));
        };
        stock.stock_quantity = left;
    }

    let subtotal = order.total_amount;
    let tax = tax_on(subtotal, tax_rate);
    let invoice = PharmacyInvoice {
        id: RecordId::new(),
        order: order.id,
        invoice_number: unique_invoice_number(tables, now.date_naive())?,
        subtotal,
        tax,
        total: subtotal + tax,
        issued_at: now,
    };
    tables.pharmacy_invoices.put(invoice.clone());
    Ok(invoice)
}

#[derive(Clone)]
pub struct PharmacyService {
    ctx: Arc<CoreContext>,
}

impl PharmacyService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Creates an order for a prescription at one pharmacy.
    ///
    /// Each prescription line is matched to the first stock row that can supply the full
    /// quantity. Lines with no such row are left out of the order and reported in
    /// [`OrderOutcome::skipped`]; the order is created regardless.
    ///
    /// # Errors
    ///
    /// - [`CareError::Permission`] unless the actor owns the prescription or administers
    ///   the pharmacy.
    /// - [`CareError::Validation`] if the pharmacy is not active.
    pub fn create_order(
        &self,
        actor: &Actor,
        prescription: RecordId,
        pharmacy: RecordId,
    ) -> CareResult<OrderOutcome> {
        authorize(actor, Operation::CreatePharmacyOrder)?;
        let now = Utc::now();

        let outcome = self.ctx.store().transaction(|t| {
            let rx = t.prescriptions.fetch(prescription)?.clone();
            let shop = t.pharmacies.fetch(pharmacy)?;
            let scope = AccessScope::resolve(t, actor);
            if !scope.owns_patient(rx.patient) && scope.pharmacy != Some(pharmacy) {
                return Err(CareError::permission(
                    "only the patient or the pharmacy may place this order",
                ));
            }
            if !shop.is_active {
                return Err(CareError::validation(format!("{} is not active", shop.name)));
            }

            let order_id = RecordId::new();
            let mut items = Vec::new();
            let mut skipped = Vec::new();
            for line in t.prescription_lines(rx.id) {
                match match_line(t, pharmacy, line) {
                    Ok((stock, unit_price)) => items.push(PharmacyOrderItem {
                        id: RecordId::new(),
                        order: order_id,
                        prescription_medicine: line.id,
                        pharmacy_medicine: stock,
                        quantity: line.quantity,
                        unit_price,
                        total_price: unit_price.times(line.quantity),
                    }),
                    Err(missing) => skipped.push(missing),
                }
            }

            let order = PharmacyOrder {
                id: order_id,
                prescription: rx.id,
                pharmacy,
                patient: rx.patient,
                status: OrderStatus::Pending,
                total_amount: items.iter().map(|i| i.total_price).sum(),
                created_at: now,
                updated_at: now,
            };
            t.pharmacy_orders.put(order.clone());
            for item in &items {
                t.pharmacy_order_items.put(item.clone());
            }
            Ok(OrderOutcome {
                order,
                items,
                skipped,
            })
        })?;

        if !outcome.skipped.is_empty() {
            tracing::warn!(
                order = %outcome.order.id,
                skipped = outcome.skipped.len(),
                "order created with unfilled prescription lines"
            );
        }
        tracing::info!(order = %outcome.order.id, total = %outcome.order.total_amount, "pharmacy order created");
        self.ctx.record(
            AuditEvent::new(
                actor,
                "PHARMACY_ORDER_CREATED",
                resource::PHARMACY_ORDER,
                outcome.order.id,
            )
            .with_details(serde_json::json!({
                "items": outcome.items.len(),
                "skipped": outcome.skipped.len(),
                "total_amount": outcome.order.total_amount,
            })),
        );
        Ok(outcome)
    }

    /// Advances an order along its lifecycle (pharmacy admin of the order's pharmacy).
    ///
    /// Completing an order decrements stock for every item and issues an invoice taxed at
    /// the configured pharmacy rate. A shortfall on any item fails the whole update.
    pub fn update_order_status(
        &self,
        actor: &Actor,
        order: RecordId,
        status: OrderStatus,
    ) -> CareResult<OrderUpdate> {
        authorize(actor, Operation::UpdatePharmacyOrder)?;
        let now = Utc::now();
        let tax_rate = self.ctx.cfg().pharmacy_tax_rate();

        let (update, patient_user) = self.ctx.store().transaction(|t| {
            let current = t.pharmacy_orders.fetch(order)?.clone();
            if AccessScope::resolve(t, actor).pharmacy != Some(current.pharmacy) {
                return Err(CareError::permission("this order belongs to another pharmacy"));
            }
            check_transition(current.status, status)?;

            let invoice = match status {
                OrderStatus::Completed => Some(complete_order(t, &current, tax_rate, now)?),
                _ => None,
            };
            let saved = t.pharmacy_orders.fetch_mut(order)?;
            saved.status = status;
            saved.updated_at = now;
            let saved = saved.clone();
            Ok((
                OrderUpdate {
                    order: saved,
                    invoice,
                },
                t.patient_user(current.patient)?,
            ))
        })?;

        tracing::info!(%order, %status, "pharmacy order updated");
        let mut event = AuditEvent::new(
            actor,
            format!("PHARMACY_ORDER_{}", status.as_str()),
            resource::PHARMACY_ORDER,
            order,
        );
        if let Some(invoice) = &update.invoice {
            event = event.with_details(serde_json::json!({
                "invoice_number": invoice.invoice_number,
                "total": invoice.total,
            }));
        }
        self.ctx.record(event);

        let message = match status {
            OrderStatus::Ready => Some((
                NotificationCategory::PrescriptionReady,
                "Medicines ready",
                "Your medicines are ready for pickup.",
            )),
            OrderStatus::Dispatched => Some((
                NotificationCategory::MedicineDispatched,
                "Medicines dispatched",
                "Your medicines are on their way.",
            )),
            _ => None,
        };
        if let Some((category, title, body)) = message {
            self.ctx
                .notify(NotificationRequest::push(patient_user, category, title, body));
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{money, Fixture};

    fn stock_level(fx: &Fixture, row: RecordId) -> u32 {
        fx.ctx
            .store()
            .read(|t| Ok(t.pharmacy_stock.fetch(row)?.stock_quantity))
            .expect("stock row")
    }

    #[test]
    fn test_order_prices_matched_lines_and_reports_skipped() {
        let fx = Fixture::new();
        let (_, rx) = fx.prescribed();
        fx.stock(fx.medicine_a, 50, "12.50");
        fx.stock(fx.medicine_b, 2, "3.00");

        let outcome = PharmacyService::new(fx.ctx.clone())
            .create_order(&fx.patient, rx.prescription.id, fx.pharmacy)
            .expect("create order");

        assert_eq!(outcome.order.status, OrderStatus::Pending);
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].total_price, money("125"));
        assert_eq!(outcome.order.total_amount, money("125"));
        assert_eq!(
            outcome.skipped,
            vec![SkippedLine {
                medicine: fx.medicine_b,
                requested: 4,
                available: 2,
            }]
        );
        assert_eq!(
            fx.audit_actions(outcome.order.id),
            vec!["PHARMACY_ORDER_CREATED"]
        );
    }

    #[test]
    fn test_unlisted_medicine_reports_zero_available() {
        let fx = Fixture::new();
        let (_, rx) = fx.prescribed();
        let outcome = PharmacyService::new(fx.ctx.clone())
            .create_order(&fx.pharmacy_admin, rx.prescription.id, fx.pharmacy)
            .expect("create order");
        assert!(outcome.items.is_empty());
        assert!(outcome.order.total_amount.is_zero());
        assert!(outcome.skipped.iter().all(|s| s.available == 0));
    }

    #[test]
    fn test_stranger_cannot_order() {
        let fx = Fixture::new();
        let (_, rx) = fx.prescribed();
        let err = PharmacyService::new(fx.ctx.clone())
            .create_order(&fx.other_patient, rx.prescription.id, fx.pharmacy)
            .expect_err("not their prescription");
        assert!(matches!(err, CareError::Permission(_)));
    }

    #[test]
    fn test_completion_invoices_and_decrements_stock() {
        let fx = Fixture::new();
        let (_, rx) = fx.prescribed();
        let row_a = fx.stock(fx.medicine_a, 50, "10").id;
        let row_b = fx.stock(fx.medicine_b, 20, "5").id;
        let svc = PharmacyService::new(fx.ctx.clone());
        let order = svc
            .create_order(&fx.patient, rx.prescription.id, fx.pharmacy)
            .expect("create order")
            .order;
        assert_eq!(order.total_amount, money("120"));

        for status in [OrderStatus::Processing, OrderStatus::Ready] {
            let update = svc
                .update_order_status(&fx.pharmacy_admin, order.id, status)
                .expect("advance order");
            assert!(update.invoice.is_none());
        }
        let done = svc
            .update_order_status(&fx.pharmacy_admin, order.id, OrderStatus::Completed)
            .expect("complete order");

        let invoice = done.invoice.expect("invoice issued");
        assert_eq!(invoice.subtotal, money("120"));
        assert_eq!(invoice.tax, money("21.60"));
        assert_eq!(invoice.total, money("141.60"));
        assert!(invoice.invoice_number.as_str().starts_with("INV-"));
        assert_eq!(stock_level(&fx, row_a), 40);
        assert_eq!(stock_level(&fx, row_b), 16);

        let categories: Vec<_> = fx
            .ctx
            .notifications()
            .for_recipient(fx.patient.user_id)
            .into_iter()
            .map(|n| n.category)
            .collect();
        let ready = categories
            .iter()
            .filter(|c| **c == NotificationCategory::PrescriptionReady)
            .count();
        assert_eq!(ready, 2, "prescription written, then medicines ready");
    }

    #[test]
    fn test_stock_shortfall_at_completion_changes_nothing() {
        let fx = Fixture::new();
        let (_, rx) = fx.prescribed();
        let row_a = fx.stock(fx.medicine_a, 10, "10").id;
        let svc = PharmacyService::new(fx.ctx.clone());
        let order = svc
            .create_order(&fx.patient, rx.prescription.id, fx.pharmacy)
            .expect("create order")
            .order;
        svc.update_order_status(&fx.pharmacy_admin, order.id, OrderStatus::Processing)
            .expect("processing");
        svc.update_order_status(&fx.pharmacy_admin, order.id, OrderStatus::Ready)
            .expect("ready");

        fx.stock(fx.medicine_a, 3, "10");
        let err = svc
            .update_order_status(&fx.pharmacy_admin, order.id, OrderStatus::Completed)
            .expect_err("shelf was emptied");
        assert!(matches!(err, CareError::StateConflict(_)));
        assert_eq!(stock_level(&fx, row_a), 3);
        let (status, invoices) = fx
            .ctx
            .store()
            .read(|t| {
                Ok((
                    t.pharmacy_orders.fetch(order.id)?.status,
                    t.pharmacy_invoices.len(),
                ))
            })
            .expect("read");
        assert_eq!(status, OrderStatus::Ready);
        assert_eq!(invoices, 0);
    }

    #[test]
    fn test_illegal_order_transition_conflicts() {
        let fx = Fixture::new();
        let (_, rx) = fx.prescribed();
        let svc = PharmacyService::new(fx.ctx.clone());
        let order = svc
            .create_order(&fx.patient, rx.prescription.id, fx.pharmacy)
            .expect("create order")
            .order;
        let err = svc
            .update_order_status(&fx.pharmacy_admin, order.id, OrderStatus::Completed)
            .expect_err("pending cannot complete");
        assert!(matches!(err, CareError::StateConflict(_)));

        let err = svc
            .update_order_status(&fx.patient, order.id, OrderStatus::Processing)
            .expect_err("patients do not run the pharmacy");
        assert!(matches!(err, CareError::Permission(_)));
    }
}
