//! Appointment workflow: the status graph, role-gated transitions and their side effects
//! (fee and commission derivation, walk-in queue allocation, audit and notifications).

mod engine;
pub mod finance;
mod queue;
pub mod transitions;

pub use engine::{
    AppointmentFilter, AppointmentService, AppointmentUpdate, Assignment, NewAppointment,
};
pub use queue::{QueueService, WalkIn, WalkInOutcome};

pub(crate) use engine::apply_assignment;
pub(crate) use queue::allocate_queue_entry;
