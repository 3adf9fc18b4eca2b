//! # CareLink Core
//!
//! Business logic for the CareLink healthcare operations platform:
//! - the entity store ([`store`]) with atomic transactions and optional JSON snapshots
//! - identity resolution and the role/scope access policy
//! - the appointment workflow engine, walk-in queues and fee/commission derivation
//! - cross-domain dispatch: prescriptions, pharmacy orders, lab requests, EMR, payments
//! - audit and notification sinks
//!
//! **No API concerns**: HTTP servers and DTOs belong in `api-rest` and `api-shared`.
//!
//! Every service is built from a shared [`CoreContext`] and takes the acting [`Actor`] as
//! its first argument.

pub mod admin;
pub mod audit;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod model;
pub mod notify;
pub mod policy;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use admin::AdminService;
pub use audit::{AuditEvent, AuditSink, InMemoryAuditLog, JsonlAuditLog};
pub use config::CoreConfig;
pub use dispatch::{EmrService, LabService, PaymentService, PharmacyService, PrescriptionService};
pub use error::{CareError, CareResult};
pub use identity::{Actor, IdentityService};
pub use notify::{InMemoryNotificationQueue, NotificationSink};
pub use store::EntityStore;
pub use workflow::{AppointmentService, QueueService};

pub use carelink_ids::RecordId;

use std::sync::Arc;

/// Everything a service needs: configuration, the store and the two sinks.
///
/// Built once at startup and shared behind an `Arc`.
#[derive(Clone)]
pub struct CoreContext {
    cfg: Arc<CoreConfig>,
    store: Arc<EntityStore>,
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
}

impl CoreContext {
    pub fn new(
        cfg: Arc<CoreConfig>,
        store: Arc<EntityStore>,
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cfg,
            store,
            audit,
            notifications,
        }
    }

    /// A context with no persistence at all.
    pub fn in_memory(cfg: Arc<CoreConfig>) -> Self {
        Self::new(
            cfg,
            Arc::new(EntityStore::in_memory()),
            Arc::new(InMemoryAuditLog::new()),
            Arc::new(InMemoryNotificationQueue::new()),
        )
    }

    /// Opens the context described by `cfg`.
    ///
    /// With a data directory, the store is loaded from (and saved to) its snapshot and audit
    /// entries go to a JSON lines file beside it. Without one, everything is in memory.
    pub fn open(cfg: Arc<CoreConfig>) -> CareResult<Self> {
        let (Some(snapshot), Some(audit_log)) = (cfg.snapshot_path(), cfg.audit_log_path())
        else {
            tracing::info!("no data directory configured; store is in-memory only");
            return Ok(Self::in_memory(cfg));
        };

        let store = EntityStore::open(&snapshot)?;
        let audit = JsonlAuditLog::open(&audit_log)?;
        Ok(Self::new(
            cfg,
            Arc::new(store),
            Arc::new(audit),
            Arc::new(InMemoryNotificationQueue::new()),
        ))
    }

    pub fn cfg(&self) -> &Arc<CoreConfig> {
        &self.cfg
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    pub fn notifications(&self) -> &Arc<dyn NotificationSink> {
        &self.notifications
    }

    pub fn identity(&self) -> IdentityService {
        IdentityService::new(self.store.clone())
    }

    pub(crate) fn record(&self, event: audit::AuditEvent) {
        self.audit.append(event);
    }

    pub(crate) fn notify(&self, request: notify::NotificationRequest) {
        self.notifications.enqueue(request);
    }
}
