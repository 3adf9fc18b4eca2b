//! Fee and commission derivation.
//!
//! Commission is always recomputed from the current fee. Nothing here reads the previous
//! commission, so repeated saves cannot accumulate it.

use crate::model::{Appointment, Hospital};
use carelink_types::{Money, Percentage};

/// `round(fee × rate / 100, 2)`, rounding half away from zero.
pub fn platform_commission(fee: Money, rate: Percentage) -> Money {
    fee.percent(rate)
}

/// Recomputes the appointment's commission from its current fee and the hospital's rate.
/// An appointment without a fee carries no commission.
pub fn refresh_commission(appointment: &mut Appointment, hospital: &Hospital) {
    appointment.platform_commission = appointment
        .consultation_fee
        .map(|fee| platform_commission(fee, hospital.commission_rate))
        .unwrap_or(Money::ZERO);
}

/// Splits a payment into (platform commission, hospital amount).
///
/// Payments with no hospital carry no commission.
pub fn split_payment(amount: Money, rate: Option<Percentage>) -> (Money, Money) {
    let commission = rate
        .map(|rate| platform_commission(amount, rate))
        .unwrap_or(Money::ZERO);
    (commission, amount.saturating_sub(commission))
}

/// Tax owed on `subtotal` at `rate` percent.
pub fn tax_on(subtotal: Money, rate: Percentage) -> Money {
    subtotal.percent(rate)
}
