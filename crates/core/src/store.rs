//! In-memory entity store with atomic transactions and optional JSON snapshots.
//!
//! All tables live behind one `RwLock`. A write transaction clones the tables into a draft,
//! runs the caller's closure against the draft and swaps it in only when the closure returns
//! `Ok`. A failed closure therefore leaves no trace, which is how multi-record operations
//! (prescription + lines + appointment status, order completion + stock + invoice) stay
//! all-or-nothing.
//!
//! When a snapshot path is configured the committed draft is written to disk before it
//! becomes visible: first to `store.json.tmp`, then renamed over `store.json`.

use crate::model::{
    Appointment, Department, Doctor, EmrRecord, Hospital, Lab, LabReport, LabTest,
    LabTestRecommendation, LabTestRequest, Medicine, Patient, Payment, PaymentInvoice, Pharmacy,
    PharmacyInvoice, PharmacyMedicine, PharmacyOrder, PharmacyOrderItem, Prescription,
    PrescriptionMedicine, QueueEntry, Record, User, VitalsRecord,
};
use crate::{CareError, CareResult};
use carelink_ids::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// One table: records ordered by id.
pub type Table<T> = BTreeMap<RecordId, T>;

/// Keyed access helpers for every table.
pub trait TableExt<T: Record> {
    /// Returns the record or [`CareError::NotFound`] naming its kind.
    fn fetch(&self, id: RecordId) -> CareResult<&T>;
    fn fetch_mut(&mut self, id: RecordId) -> CareResult<&mut T>;
    /// Inserts or replaces the record under its own id.
    fn put(&mut self, record: T);
}

impl<T: Record> TableExt<T> for Table<T> {
    fn fetch(&self, id: RecordId) -> CareResult<&T> {
        self.get(&id).ok_or_else(|| CareError::not_found(T::KIND, id))
    }

    fn fetch_mut(&mut self, id: RecordId) -> CareResult<&mut T> {
        self.get_mut(&id)
            .ok_or_else(|| CareError::not_found(T::KIND, id))
    }

    fn put(&mut self, record: T) {
        self.insert(record.id(), record);
    }
}

/// Every persisted table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub users: Table<User>,
    pub patients: Table<Patient>,
    pub hospitals: Table<Hospital>,
    pub departments: Table<Department>,
    pub doctors: Table<Doctor>,
    pub appointments: Table<Appointment>,
    pub queue_entries: Table<QueueEntry>,
    pub emr_records: Table<EmrRecord>,
    pub vitals: Table<VitalsRecord>,
    pub medicines: Table<Medicine>,
    pub prescriptions: Table<Prescription>,
    pub prescription_medicines: Table<PrescriptionMedicine>,
    pub lab_recommendations: Table<LabTestRecommendation>,
    pub pharmacies: Table<Pharmacy>,
    pub pharmacy_stock: Table<PharmacyMedicine>,
    pub pharmacy_orders: Table<PharmacyOrder>,
    pub pharmacy_order_items: Table<PharmacyOrderItem>,
    pub pharmacy_invoices: Table<PharmacyInvoice>,
    pub labs: Table<Lab>,
    pub lab_tests: Table<LabTest>,
    pub lab_requests: Table<LabTestRequest>,
    pub lab_reports: Table<LabReport>,
    pub payments: Table<Payment>,
    pub payment_invoices: Table<PaymentInvoice>,
}

impl Tables {
    pub fn patient_for_user(&self, user: RecordId) -> Option<&Patient> {
        self.patients.values().find(|p| p.user == user)
    }

    pub fn doctor_for_user(&self, user: RecordId) -> Option<&Doctor> {
        self.doctors.values().find(|d| d.user == user)
    }

    /// The user behind a patient profile, used to address notifications.
    pub fn patient_user(&self, patient: RecordId) -> CareResult<RecordId> {
        Ok(self.patients.fetch(patient)?.user)
    }

    pub fn emr_for_appointment(&self, appointment: RecordId) -> Option<&EmrRecord> {
        self.emr_records
            .values()
            .find(|e| e.appointment == appointment)
    }

    pub fn prescription_for_appointment(&self, appointment: RecordId) -> Option<&Prescription> {
        self.prescriptions
            .values()
            .find(|p| p.appointment == appointment)
    }

    /// Prescription medicine lines in prescribed order.
    pub fn prescription_lines(&self, prescription: RecordId) -> Vec<&PrescriptionMedicine> {
        let mut lines: Vec<_> = self
            .prescription_medicines
            .values()
            .filter(|l| l.prescription == prescription)
            .collect();
        lines.sort_by_key(|l| l.line);
        lines
    }

    pub fn lab_recommendations_for(&self, prescription: RecordId) -> Vec<&LabTestRecommendation> {
        self.lab_recommendations
            .values()
            .filter(|r| r.prescription == prescription)
            .collect()
    }
}

/// Thread-safe store shared by every service.
#[derive(Debug, Default)]
pub struct EntityStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
}

impl EntityStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens (or starts) a store persisted at `snapshot_path`.
    ///
    /// The parent directory is created if needed. An existing snapshot is loaded; a missing
    /// one starts an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Persistence`] if the directory or file cannot be accessed and
    /// [`CareError::Serialization`] if the snapshot is not valid JSON for [`Tables`].
    pub fn open(snapshot_path: &Path) -> CareResult<Self> {
        if let Some(parent) = snapshot_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tables = if snapshot_path.is_file() {
            let raw = fs::read_to_string(snapshot_path)?;
            let tables: Tables = serde_json::from_str(&raw)?;
            tracing::info!(
                path = %snapshot_path.display(),
                users = tables.users.len(),
                appointments = tables.appointments.len(),
                "loaded store snapshot"
            );
            tables
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(snapshot_path.to_path_buf()),
        })
    }

    /// Runs a read-only query under the shared lock.
    pub fn read<T>(&self, query: impl FnOnce(&Tables) -> CareResult<T>) -> CareResult<T> {
        let guard = self
            .tables
            .read()
            .map_err(|_| CareError::StoreUnavailable)?;
        query(&guard)
    }

    /// Runs `work` against a draft of the tables and commits the draft only on success.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error unchanged (nothing is committed), or returns a
    /// persistence error if the snapshot cannot be written (nothing is committed either).
    pub fn transaction<T>(
        &self,
        work: impl FnOnce(&mut Tables) -> CareResult<T>,
    ) -> CareResult<T> {
        let mut guard = self
            .tables
            .write()
            .map_err(|_| CareError::StoreUnavailable)?;

        let mut draft = guard.clone();
        let out = work(&mut draft)?;

        if let Some(path) = &self.snapshot_path {
            write_snapshot(path, &draft)?;
        }
        *guard = draft;
        Ok(out)
    }
}

fn write_snapshot(path: &Path, tables: &Tables) -> CareResult<()> {
    let json = serde_json::to_string_pretty(tables)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
