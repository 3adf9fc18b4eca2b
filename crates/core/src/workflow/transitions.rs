//! Lifecycle graphs for appointments, pharmacy orders and lab requests.
//!
//! A status change is legal only along an edge listed here; anything else is a
//! [`CareError::StateConflict`]. Role checks happen before graph checks, in the services.

use crate::model::{AppointmentStatus, LabRequestStatus, OrderStatus};
use crate::{CareError, CareResult};
use std::fmt::Display;

/// A status enum with a fixed transition graph.
pub trait Lifecycle: Copy + PartialEq + Display + 'static {
    /// Kind name used in conflict messages.
    const SUBJECT: &'static str;

    fn allowed_targets(&self) -> &'static [Self];

    fn can_transition_to(&self, target: Self) -> bool {
        self.allowed_targets().contains(&target)
    }

    fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }
}

/// Fails with [`CareError::StateConflict`] unless `from -> to` is an edge of the graph.
pub fn check_transition<S: Lifecycle>(from: S, to: S) -> CareResult<()> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    tracing::warn!(subject = S::SUBJECT, %from, %to, "invalid status transition");
    Err(CareError::conflict(format!(
        "{} cannot move from {from} to {to}",
        S::SUBJECT
    )))
}

impl Lifecycle for AppointmentStatus {
    const SUBJECT: &'static str = "appointment";

    fn allowed_targets(&self) -> &'static [Self] {
        use AppointmentStatus::*;
        match self {
            Requested => &[Reviewed, Assigned, Cancelled],
            Reviewed => &[Assigned, Rescheduled, Cancelled],
            Assigned => &[Assigned, Confirmed, InProgress, Rescheduled, Cancelled],
            Confirmed => &[InProgress, Rescheduled, Cancelled],
            Rescheduled => &[Reviewed, Assigned, Confirmed, Cancelled],
            InProgress => &[Completed],
            Completed => &[Billed],
            Billed => &[Closed],
            Closed | Cancelled => &[],
        }
    }
}

impl AppointmentStatus {
    /// States in which a walk-in holds a place in the queue.
    pub fn is_queue_active(&self) -> bool {
        matches!(self, AppointmentStatus::Assigned | AppointmentStatus::Confirmed)
    }

    /// States from which writing a prescription completes the visit.
    pub fn accepts_prescription(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Assigned
                | AppointmentStatus::Confirmed
                | AppointmentStatus::InProgress
                | AppointmentStatus::Completed
        )
    }
}

impl Lifecycle for OrderStatus {
    const SUBJECT: &'static str = "pharmacy order";

    fn allowed_targets(&self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Processing, Cancelled],
            Processing => &[Ready, Cancelled],
            Ready => &[Dispatched, Completed, Cancelled],
            Dispatched => &[Completed],
            Completed | Cancelled => &[],
        }
    }
}

impl Lifecycle for LabRequestStatus {
    const SUBJECT: &'static str = "lab request";

    fn allowed_targets(&self) -> &'static [Self] {
        use LabRequestStatus::*;
        match self {
            Pending => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}
