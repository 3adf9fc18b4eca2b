//! Route handlers, grouped by the area of the platform they serve.

pub(crate) mod appointments;
pub(crate) mod clinical;
pub(crate) mod general;
pub(crate) mod operations;
pub(crate) mod orders;
pub(crate) mod payments;
