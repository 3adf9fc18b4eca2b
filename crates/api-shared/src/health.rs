use crate::dto::HealthRes;

/// Liveness reporting for the API front ends.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// The service answers whenever the process is up; it does not probe the store.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "CareLink is alive".into(),
        }
    }
}
