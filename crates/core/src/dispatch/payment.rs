//! Payments against consultations, pharmacy orders and lab requests.
//!
//! A consultation payment drives the tail of the appointment lifecycle: processing it
//! bills the appointment, issuing its invoice closes it.

use super::unique_invoice_number;
use crate::audit::{appointment_action, AuditEvent};
use crate::constants::resource;
use crate::identity::Actor;
use crate::model::{
    AppointmentStatus, Payment, PaymentInvoice, PaymentMethod, PaymentStatus, PaymentType, Role,
};
use crate::notify::{NotificationCategory, NotificationRequest};
use crate::policy::{authorize, AccessScope, Operation};
use crate::store::{TableExt, Tables};
use crate::workflow::finance::split_payment;
use crate::workflow::transitions::check_transition;
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::{RecordId, TransactionId};
use carelink_types::Money;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub appointment: Option<RecordId>,
    pub pharmacy_order: Option<RecordId>,
    pub lab_request: Option<RecordId>,
    /// The amount for charges with nothing to derive it from (bed and OT charges, unpriced
    /// lab requests). Where the linked record fixes the amount, a differing value is
    /// rejected.
    pub amount: Option<Money>,
}

/// What a new payment is for: the amount owed and the hospital that earns it.
struct Charge {
    amount: Option<Money>,
    hospital: Option<RecordId>,
}

fn required<T>(value: Option<T>, what: &str) -> CareResult<T> {
    value.ok_or_else(|| CareError::validation(format!("{what} is required for this payment")))
}

fn resolve_charge(
    tables: &Tables,
    scope: &AccessScope,
    actor: &Actor,
    request: &NewPayment,
) -> CareResult<Charge> {
    let check_owner = |patient: RecordId| {
        if actor.role == Role::Patient && !scope.owns_patient(patient) {
            return Err(CareError::permission("you may only pay for your own care"));
        }
        Ok(())
    };

    match request.payment_type {
        PaymentType::Consultation => {
            let appt = tables
                .appointments
                .fetch(required(request.appointment, "an appointment")?)?;
            if !scope.owns_patient(appt.patient) {
                return Err(CareError::permission(
                    "only the patient may pay for a consultation",
                ));
            }
            if appt.status != AppointmentStatus::Completed {
                return Err(CareError::conflict(format!(
                    "consultation is {}, not completed",
                    appt.status
                )));
            }
            let already_paid = tables.payments.values().any(|p| {
                p.appointment == Some(appt.id)
                    && p.payment_type == PaymentType::Consultation
                    && matches!(
                        p.status,
                        PaymentStatus::Pending | PaymentStatus::Processing | PaymentStatus::Completed
                    )
            });
            if already_paid {
                return Err(CareError::conflict("consultation already has a payment"));
            }
            Ok(Charge {
                amount: appt.consultation_fee,
                hospital: Some(appt.hospital),
            })
        }
        PaymentType::Pharmacy => {
            let order = tables
                .pharmacy_orders
                .fetch(required(request.pharmacy_order, "a pharmacy order")?)?;
            check_owner(order.patient)?;
            Ok(Charge {
                amount: Some(order.total_amount),
                hospital: None,
            })
        }
        PaymentType::LabTest => {
            let lab_request = tables
                .lab_requests
                .fetch(required(request.lab_request, "a lab request")?)?;
            check_owner(lab_request.patient)?;
            let price = match lab_request.lab_test {
                Some(test) => Some(tables.lab_tests.fetch(test)?.price),
                None => None,
            };
            Ok(Charge {
                amount: price,
                hospital: None,
            })
        }
        PaymentType::BedCharge | PaymentType::OtCharge => {
            let hospital = match request.appointment {
                Some(id) => {
                    let appt = tables.appointments.fetch(id)?;
                    check_owner(appt.patient)?;
                    Some(appt.hospital)
                }
                None => None,
            };
            Ok(Charge {
                amount: None,
                hospital,
            })
        }
    }
}

fn require_payer(scope: &AccessScope, payment: &Payment) -> CareResult<()> {
    if scope.user == Some(payment.payer) || scope.is_super_admin() {
        Ok(())
    } else {
        Err(CareError::permission("this payment belongs to someone else"))
    }
}

/// Moves a consultation's appointment along as a system transition.
fn advance_consultation(
    tables: &mut Tables,
    payment: &Payment,
    target: AppointmentStatus,
    now: DateTime<Utc>,
) -> CareResult<Option<RecordId>> {
    let (PaymentType::Consultation, Some(id)) = (payment.payment_type, payment.appointment) else {
        return Ok(None);
    };
    let appt = tables.appointments.fetch_mut(id)?;
    check_transition(appt.status, target)?;
    appt.status = target;
    appt.updated_at = now;
    Ok(Some(id))
}

#[derive(Clone)]
pub struct PaymentService {
    ctx: Arc<CoreContext>,
}

impl PaymentService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Opens a Pending payment.
    ///
    /// The amount comes from the linked record: the consultation fee, the order total or
    /// the lab test price. Only charges without such a record take the requested amount.
    /// Commission uses the hospital's rate when the payment is tied
    /// to a hospital and is zero otherwise.
    ///
    /// # Errors
    ///
    /// - [`CareError::Validation`] if the linked record is missing, no amount can be
    ///   determined, or the requested amount differs from the one owed.
    /// - [`CareError::Permission`] if a consultation is paid by anyone but its patient.
    /// - [`CareError::StateConflict`] if the consultation is not Completed or is already
    ///   being paid.
    pub fn create_payment(&self, actor: &Actor, request: NewPayment) -> CareResult<Payment> {
        authorize(actor, Operation::CreatePayment)?;
        let now = Utc::now();

        let payment = self.ctx.store().transaction(|t| {
            let scope = AccessScope::resolve(t, actor);
            let charge = resolve_charge(t, &scope, actor, &request)?;
            let amount = match (charge.amount, request.amount) {
                (Some(owed), Some(offered)) if offered != owed => {
                    tracing::warn!(
                        user = %actor.user_id,
                        kind = %request.payment_type,
                        %owed,
                        %offered,
                        "payment amount does not match the charge"
                    );
                    return Err(CareError::validation(format!(
                        "{} payment must be {owed}, not {offered}",
                        request.payment_type
                    )));
                }
                (Some(owed), _) => owed,
                (None, Some(offered)) => offered,
                (None, None) => {
                    return Err(CareError::validation("an amount is required for this payment"));
                }
            };
            if amount.is_zero() {
                return Err(CareError::validation("payment amount must be positive"));
            }
            let rate = match charge.hospital {
                Some(hospital) => Some(t.hospitals.fetch(hospital)?.commission_rate),
                None => None,
            };
            let (platform_commission, hospital_amount) = split_payment(amount, rate);

            let payment = Payment {
                id: RecordId::new(),
                payer: actor.user_id,
                hospital: charge.hospital,
                payment_type: request.payment_type,
                amount,
                platform_commission,
                hospital_amount,
                method: request.method,
                status: PaymentStatus::Pending,
                appointment: request.appointment,
                pharmacy_order: request.pharmacy_order,
                lab_request: request.lab_request,
                transaction_id: TransactionId::generate(),
                gateway_response: None,
                created_at: now,
                completed_at: None,
            };
            t.payments.put(payment.clone());
            Ok(payment)
        })?;

        tracing::info!(
            payment = %payment.id,
            kind = %payment.payment_type,
            amount = %payment.amount,
            commission = %payment.platform_commission,
            "payment initiated"
        );
        self.ctx.record(
            AuditEvent::new(actor, "PAYMENT_INITIATED", resource::PAYMENT, payment.id)
                .with_details(serde_json::json!({
                    "transaction_id": payment.transaction_id,
                    "amount": payment.amount,
                })),
        );
        Ok(payment)
    }

    /// Completes a payment through the (simulated) gateway.
    ///
    /// A consultation payment moves its appointment from Completed to Billed in the same
    /// transaction.
    pub fn process_payment(&self, actor: &Actor, id: RecordId) -> CareResult<Payment> {
        authorize(actor, Operation::ProcessPayment)?;
        let now = Utc::now();

        let (payment, billed) = self.ctx.store().transaction(|t| {
            let current = t.payments.fetch(id)?.clone();
            require_payer(&AccessScope::resolve(t, actor), &current)?;
            if !matches!(
                current.status,
                PaymentStatus::Pending | PaymentStatus::Processing
            ) {
                return Err(CareError::conflict(format!(
                    "payment is already {}",
                    current.status
                )));
            }
            let billed = advance_consultation(t, &current, AppointmentStatus::Billed, now)?;

            let payment = t.payments.fetch_mut(id)?;
            payment.status = PaymentStatus::Completed;
            payment.completed_at = Some(now);
            payment.gateway_response = Some(serde_json::json!({
                "gateway": "simulated",
                "status": "success",
                "transaction_id": payment.transaction_id,
                "processed_at": now,
            }));
            Ok((payment.clone(), billed))
        })?;

        tracing::info!(payment = %id, "payment completed");
        self.ctx.record(AuditEvent::new(
            actor,
            "PAYMENT_COMPLETED",
            resource::PAYMENT,
            id,
        ));
        if let Some(appointment) = billed {
            self.ctx.record(AuditEvent::new(
                actor,
                appointment_action(AppointmentStatus::Billed),
                resource::APPOINTMENT,
                appointment,
            ));
        }
        self.ctx.notify(NotificationRequest::push(
            payment.payer,
            NotificationCategory::PaymentSuccess,
            "Payment received",
            format!("We received your payment of {}.", payment.amount),
        ));
        Ok(payment)
    }

    /// Issues the invoice for a completed payment; a consultation's appointment is Closed.
    pub fn issue_invoice(&self, actor: &Actor, id: RecordId) -> CareResult<PaymentInvoice> {
        authorize(actor, Operation::IssuePaymentInvoice)?;
        let now = Utc::now();

        let (invoice, closed) = self.ctx.store().transaction(|t| {
            let payment = t.payments.fetch(id)?.clone();
            require_payer(&AccessScope::resolve(t, actor), &payment)?;
            if payment.status != PaymentStatus::Completed {
                return Err(CareError::conflict("only completed payments can be invoiced"));
            }
            if t.payment_invoices.values().any(|i| i.payment == id) {
                return Err(CareError::conflict("payment has already been invoiced"));
            }
            let closed = advance_consultation(t, &payment, AppointmentStatus::Closed, now)?;

            let invoice = PaymentInvoice {
                id: RecordId::new(),
                payment: id,
                invoice_number: unique_invoice_number(t, now.date_naive())?,
                subtotal: payment.amount,
                tax: Money::ZERO,
                platform_commission: payment.platform_commission,
                total: payment.amount,
                issued_at: now,
            };
            t.payment_invoices.put(invoice.clone());
            Ok((invoice, closed))
        })?;

        tracing::info!(payment = %id, invoice = %invoice.invoice_number, "payment invoiced");
        self.ctx.record(
            AuditEvent::new(actor, "PAYMENT_INVOICE_ISSUED", resource::PAYMENT, id)
                .with_details(serde_json::json!({ "invoice_number": invoice.invoice_number })),
        );
        if let Some(appointment) = closed {
            self.ctx.record(AuditEvent::new(
                actor,
                appointment_action(AppointmentStatus::Closed),
                resource::APPOINTMENT,
                appointment,
            ));
        }
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{LabService, PharmacyService};
    use crate::testing::{money, Fixture};

    fn consultation(appointment: RecordId) -> NewPayment {
        NewPayment {
            payment_type: PaymentType::Consultation,
            method: PaymentMethod::Upi,
            appointment: Some(appointment),
            pharmacy_order: None,
            lab_request: None,
            amount: None,
        }
    }

    #[test]
    fn test_consultation_payment_bills_then_closes_visit() {
        let fx = Fixture::new();
        let (appt, _) = fx.prescribed();
        assert_eq!(appt.status, AppointmentStatus::Completed);
        let svc = PaymentService::new(fx.ctx.clone());

        let payment = svc
            .create_payment(&fx.patient, consultation(appt.id))
            .expect("create payment");
        assert_eq!(payment.amount, money("500"));
        assert_eq!(payment.platform_commission.to_string(), "25.00");
        assert_eq!(payment.hospital_amount.to_string(), "475.00");
        assert_eq!(payment.hospital, Some(fx.hospital));
        assert!(payment.transaction_id.as_str().starts_with("TXN"));

        let done = svc.process_payment(&fx.patient, payment.id).expect("process");
        assert_eq!(done.status, PaymentStatus::Completed);
        assert!(done.gateway_response.is_some());
        assert_eq!(fx.appointment(appt.id).status, AppointmentStatus::Billed);

        let invoice = svc.issue_invoice(&fx.patient, payment.id).expect("invoice");
        assert_eq!(invoice.total, money("500"));
        assert!(invoice.tax.is_zero());
        assert_eq!(invoice.platform_commission.to_string(), "25.00");
        assert_eq!(fx.appointment(appt.id).status, AppointmentStatus::Closed);

        let actions = fx.audit_actions(appt.id);
        assert_eq!(
            &actions[actions.len() - 2..],
            &["APPOINTMENT_BILLED", "APPOINTMENT_CLOSED"]
        );
        assert_eq!(
            fx.audit_actions(payment.id),
            vec!["PAYMENT_INITIATED", "PAYMENT_COMPLETED", "PAYMENT_INVOICE_ISSUED"]
        );

        let err = svc
            .issue_invoice(&fx.patient, payment.id)
            .expect_err("one invoice per payment");
        assert!(matches!(err, CareError::StateConflict(_)));
    }

    #[test]
    fn test_consultation_must_be_completed_and_paid_by_patient() {
        let fx = Fixture::new();
        let appt = fx.assigned();
        let svc = PaymentService::new(fx.ctx.clone());
        let err = svc
            .create_payment(&fx.patient, consultation(appt.id))
            .expect_err("visit not completed");
        assert!(matches!(err, CareError::StateConflict(_)));

        let (done, _) = fx.prescribed();
        let err = svc
            .create_payment(&fx.other_patient, consultation(done.id))
            .expect_err("not their visit");
        assert!(matches!(err, CareError::Permission(_)));

        svc.create_payment(&fx.patient, consultation(done.id))
            .expect("first payment");
        let err = svc
            .create_payment(&fx.patient, consultation(done.id))
            .expect_err("duplicate payment");
        assert!(matches!(err, CareError::StateConflict(_)));
    }

    #[test]
    fn test_consultation_amount_is_fixed_by_the_fee() {
        let fx = Fixture::new();
        let (appt, _) = fx.prescribed();
        let svc = PaymentService::new(fx.ctx.clone());

        let mut underpaid = consultation(appt.id);
        underpaid.amount = Some(money("1"));
        let err = svc
            .create_payment(&fx.patient, underpaid)
            .expect_err("amount differs from the fee");
        assert!(matches!(err, CareError::Validation(_)));
        assert!(fx
            .ctx
            .store()
            .read(|t| Ok(t.payments.is_empty()))
            .expect("read"));
        assert_eq!(fx.appointment(appt.id).status, AppointmentStatus::Completed);

        let mut exact = consultation(appt.id);
        exact.amount = Some(money("500"));
        let payment = svc
            .create_payment(&fx.patient, exact)
            .expect("matching amount is accepted");
        assert_eq!(payment.amount, money("500"));
        assert_eq!(payment.platform_commission.to_string(), "25.00");
    }

    #[test]
    fn test_bed_charge_takes_the_requested_amount() {
        let fx = Fixture::new();
        let payment = PaymentService::new(fx.ctx.clone())
            .create_payment(
                &fx.patient,
                NewPayment {
                    payment_type: PaymentType::BedCharge,
                    method: PaymentMethod::Cash,
                    appointment: None,
                    pharmacy_order: None,
                    lab_request: None,
                    amount: Some(money("1200.50")),
                },
            )
            .expect("bed charge");
        assert_eq!(payment.amount, money("1200.50"));
        assert!(payment.platform_commission.is_zero());
    }

    #[test]
    fn test_only_payer_processes() {
        let fx = Fixture::new();
        let (appt, _) = fx.prescribed();
        let svc = PaymentService::new(fx.ctx.clone());
        let payment = svc
            .create_payment(&fx.patient, consultation(appt.id))
            .expect("create payment");
        let err = svc
            .process_payment(&fx.other_patient, payment.id)
            .expect_err("not the payer");
        assert!(matches!(err, CareError::Permission(_)));
        assert_eq!(fx.appointment(appt.id).status, AppointmentStatus::Completed);

        svc.process_payment(&fx.super_admin, payment.id)
            .expect("super admin may settle");
        let err = svc
            .process_payment(&fx.patient, payment.id)
            .expect_err("already completed");
        assert!(matches!(err, CareError::StateConflict(_)));
    }

    #[test]
    fn test_pharmacy_and_lab_payments_carry_no_commission() {
        let fx = Fixture::new();
        let (_, rx) = fx.prescribed();
        fx.stock(fx.medicine_a, 100, "10");
        let order = PharmacyService::new(fx.ctx.clone())
            .create_order(&fx.patient, rx.prescription.id, fx.pharmacy)
            .expect("order")
            .order;
        let lab_request = LabService::new(fx.ctx.clone())
            .create_request(&fx.patient, rx.lab_tests[0].id, fx.lab, Some(fx.lab_test))
            .expect("lab request");
        let svc = PaymentService::new(fx.ctx.clone());

        let pharmacy = svc
            .create_payment(
                &fx.patient,
                NewPayment {
                    payment_type: PaymentType::Pharmacy,
                    method: PaymentMethod::Card,
                    appointment: None,
                    pharmacy_order: Some(order.id),
                    lab_request: None,
                    amount: None,
                },
            )
            .expect("pharmacy payment");
        assert_eq!(pharmacy.amount, money("100"));
        assert!(pharmacy.platform_commission.is_zero());
        assert_eq!(pharmacy.hospital_amount, money("100"));

        let lab = svc
            .create_payment(
                &fx.patient,
                NewPayment {
                    payment_type: PaymentType::LabTest,
                    method: PaymentMethod::Cash,
                    appointment: None,
                    pharmacy_order: None,
                    lab_request: Some(lab_request.id),
                    amount: None,
                },
            )
            .expect("lab payment");
        assert_eq!(lab.amount, money("350"));

        let lab_done = svc.process_payment(&fx.patient, lab.id).expect("process lab");
        assert_eq!(lab_done.status, PaymentStatus::Completed);
    }

    #[test]
    fn test_bed_charge_needs_an_amount() {
        let fx = Fixture::new();
        let err = PaymentService::new(fx.ctx.clone())
            .create_payment(
                &fx.patient,
                NewPayment {
                    payment_type: PaymentType::BedCharge,
                    method: PaymentMethod::Cash,
                    appointment: None,
                    pharmacy_order: None,
                    lab_request: None,
                    amount: None,
                },
            )
            .expect_err("no amount");
        assert!(matches!(err, CareError::Validation(_)));
    }
}
