//! Append-only audit trail.
//!
//! The sink is fire-and-forget: `append` never fails the calling operation. Services append
//! only after their store transaction has committed, so the trail never mentions work that
//! was rolled back.

use crate::identity::Actor;
use crate::CareResult;
use carelink_ids::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: RecordId,
    /// Upper-case action tag, e.g. `APPOINTMENT_ASSIGNED`.
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub origin: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        actor: &Actor,
        action: impl Into<String>,
        resource_type: &str,
        resource_id: impl ToString,
    ) -> Self {
        Self {
            actor: actor.user_id,
            action: action.into(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            origin: actor.origin.clone(),
            timestamp: Utc::now(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Audit tag for an appointment entering `status`, e.g. `APPOINTMENT_IN_PROGRESS`.
pub fn appointment_action(status: crate::model::AppointmentStatus) -> String {
    format!("APPOINTMENT_{}", status.as_str())
}

pub trait AuditSink: Send + Sync {
    fn append(&self, event: AuditEvent);

    /// Every entry in append order.
    fn entries(&self) -> Vec<AuditEvent>;

    fn for_resource(&self, resource_type: &str, resource_id: &str) -> Vec<AuditEvent> {
        self.entries()
            .into_iter()
            .filter(|e| e.resource_type == resource_type && e.resource_id == resource_id)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn append(&self, event: AuditEvent) {
        tracing::debug!(action = %event.action, resource = %event.resource_id, "audit");
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(_) => tracing::warn!(action = %event.action, "audit log lock poisoned; entry dropped"),
        }
    }

    fn entries(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

/// Audit log stored as one JSON object per line.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    /// Uses `path` as the log file, creating its directory if necessary.
    pub fn open(path: &Path) -> CareResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn write_line(&self, event: &AuditEvent) -> CareResult<()> {
        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, event: AuditEvent) {
        let _guard = self.write_lock.lock();
        if let Err(e) = self.write_line(&event) {
            tracing::warn!(action = %event.action, error = %e, "failed to append audit entry");
        }
    }

    fn entries(&self) -> Vec<AuditEvent> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable audit line");
                    None
                }
            })
            .collect()
    }
}
