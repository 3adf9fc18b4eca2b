//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core services as an
//! `Arc<CoreConfig>`. Request handling never reads environment variables.

use crate::constants::{
    AUDIT_LOG_FILENAME, DEFAULT_EMERGENCY_MINUTES_PER_PATIENT, DEFAULT_OPD_MINUTES_PER_PATIENT,
    DEFAULT_PHARMACY_TAX_RATE, STORE_SNAPSHOT_FILENAME,
};
use crate::model::QueueType;
use crate::{CareError, CareResult};
use carelink_types::Percentage;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: Option<PathBuf>,
    pharmacy_tax_rate: Percentage,
    opd_minutes_per_patient: u32,
    emergency_minutes_per_patient: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            pharmacy_tax_rate: Percentage::saturating(DEFAULT_PHARMACY_TAX_RATE),
            opd_minutes_per_patient: DEFAULT_OPD_MINUTES_PER_PATIENT,
            emergency_minutes_per_patient: DEFAULT_EMERGENCY_MINUTES_PER_PATIENT,
        }
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::Validation`] if either queue's minutes-per-patient is zero.
    pub fn new(
        data_dir: Option<PathBuf>,
        pharmacy_tax_rate: Percentage,
        opd_minutes_per_patient: u32,
        emergency_minutes_per_patient: u32,
    ) -> CareResult<Self> {
        if opd_minutes_per_patient == 0 || emergency_minutes_per_patient == 0 {
            return Err(CareError::validation(
                "minutes per patient must be greater than zero",
            ));
        }

        Ok(Self {
            data_dir,
            pharmacy_tax_rate,
            opd_minutes_per_patient,
            emergency_minutes_per_patient,
        })
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(STORE_SNAPSHOT_FILENAME))
    }

    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(AUDIT_LOG_FILENAME))
    }

    pub fn pharmacy_tax_rate(&self) -> Percentage {
        self.pharmacy_tax_rate
    }

    pub fn minutes_per_patient(&self, queue: QueueType) -> u32 {
        match queue {
            QueueType::Opd => self.opd_minutes_per_patient,
            QueueType::Emergency => self.emergency_minutes_per_patient,
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the data directory from an optional string value. Empty means in-memory only.
pub fn data_dir_from_env_value(value: Option<String>) -> Option<PathBuf> {
    trimmed(value).map(PathBuf::from)
}

/// Parse the pharmacy tax rate (a percentage, e.g. `18`).
///
/// If `value` is `None` or empty/whitespace, returns the default rate.
pub fn pharmacy_tax_rate_from_env_value(value: Option<String>) -> CareResult<Percentage> {
    match trimmed(value) {
        Some(v) => Ok(Percentage::from_str(&v)?),
        None => Ok(Percentage::new(DEFAULT_PHARMACY_TAX_RATE)?),
    }
}

/// Parse a minutes-per-patient value, falling back to `default` when unset.
pub fn minutes_per_patient_from_env_value(value: Option<String>, default: u32) -> CareResult<u32> {
    match trimmed(value) {
        Some(v) => v.parse::<u32>().map_err(|_| {
            CareError::validation(format!("minutes per patient must be a whole number, got '{v}'"))
        }),
        None => Ok(default),
    }
}
