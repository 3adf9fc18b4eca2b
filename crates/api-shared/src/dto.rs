//! Request and response bodies.
//!
//! Identifiers, dates, times and amounts travel as strings: ids in their 32-character
//! form, dates as `YYYY-MM-DD`, times as `HH:MM`, timestamps as RFC 3339 and money with
//! two decimal places. Enumerations use their upper snake case wire names.

use crate::parse;
use carelink_core::dispatch::{
    HistoryEntry, NewEmr, NewLabReport, NewPayment, NewPrescription, NewVitals, OrderOutcome,
    OrderUpdate, PrescribedMedicine, PrescriptionDetail, RecommendedTest, SkippedLine,
};
use carelink_core::model::{
    Appointment, EmrRecord, LabReport, LabTestRequest, Payment, PaymentInvoice,
    PharmacyInvoice, PharmacyOrder, PharmacyOrderItem, QueueEntry, VitalsRecord,
};
use carelink_core::notify::Notification;
use carelink_core::workflow::{
    AppointmentFilter, AppointmentUpdate, Assignment, NewAppointment, WalkIn, WalkInOutcome,
};
use carelink_core::{CareError, CareResult, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn opt_string(id: Option<RecordId>) -> Option<String> {
    id.map(|i| i.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

// ============================================================================
// GENERAL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusReq {
    pub status: String,
}

// ============================================================================
// APPOINTMENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppointmentRes {
    pub id: String,
    pub patient_id: String,
    pub hospital_id: String,
    pub department_id: Option<String>,
    pub doctor_id: Option<String>,
    pub preferred_doctor_id: Option<String>,
    pub appointment_type: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub status: String,
    pub priority: String,
    pub reason: String,
    pub operations_notes: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub consultation_fee: Option<String>,
    pub platform_commission: String,
    pub is_walk_in: bool,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Appointment> for AppointmentRes {
    fn from(a: Appointment) -> Self {
        Self {
            id: a.id.to_string(),
            patient_id: a.patient.to_string(),
            hospital_id: a.hospital.to_string(),
            department_id: opt_string(a.department),
            doctor_id: opt_string(a.doctor),
            preferred_doctor_id: opt_string(a.preferred_doctor),
            appointment_type: a.appointment_type.to_string(),
            appointment_date: a.appointment_date.to_string(),
            appointment_time: a.appointment_time.format("%H:%M").to_string(),
            status: a.status.to_string(),
            priority: a.priority.to_string(),
            reason: a.reason.to_string(),
            operations_notes: a.operations_notes,
            reviewed_by: opt_string(a.reviewed_by),
            reviewed_at: a.reviewed_at.map(timestamp),
            consultation_fee: a.consultation_fee.map(|f| f.to_string()),
            platform_commission: a.platform_commission.to_string(),
            is_walk_in: a.is_walk_in,
            notes: a.notes,
            created_at: timestamp(a.created_at),
            updated_at: timestamp(a.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAppointmentReq {
    pub hospital_id: String,
    pub department_id: Option<String>,
    pub preferred_doctor_id: Option<String>,
    pub appointment_type: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub reason: String,
    pub priority: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<CreateAppointmentReq> for NewAppointment {
    type Error = CareError;

    fn try_from(req: CreateAppointmentReq) -> CareResult<Self> {
        Ok(Self {
            hospital: parse::id("hospital_id", &req.hospital_id)?,
            department: parse::optional_id("department_id", req.department_id.as_deref())?,
            preferred_doctor: parse::optional_id(
                "preferred_doctor_id",
                req.preferred_doctor_id.as_deref(),
            )?,
            appointment_type: parse::wire(&req.appointment_type)?,
            appointment_date: parse::date("appointment_date", &req.appointment_date)?,
            appointment_time: parse::time("appointment_time", &req.appointment_time)?,
            reason: req.reason,
            priority: parse::optional_wire(req.priority.as_deref())?,
            notes: trimmed(req.notes),
        })
    }
}

/// A partial update; which fields apply depends on the caller's role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateAppointmentReq {
    pub status: Option<String>,
    pub doctor_id: Option<String>,
    pub department_id: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<UpdateAppointmentReq> for AppointmentUpdate {
    type Error = CareError;

    fn try_from(req: UpdateAppointmentReq) -> CareResult<Self> {
        Ok(Self {
            status: parse::optional_wire(req.status.as_deref())?,
            doctor: parse::optional_id("doctor_id", req.doctor_id.as_deref())?,
            department: parse::optional_id("department_id", req.department_id.as_deref())?,
            appointment_date: req
                .appointment_date
                .as_deref()
                .map(|d| parse::date("appointment_date", d))
                .transpose()?,
            appointment_time: req
                .appointment_time
                .as_deref()
                .map(|t| parse::time("appointment_time", t))
                .transpose()?,
            reason: req.reason,
            notes: req.notes,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AssignAppointmentReq {
    pub doctor_id: Option<String>,
    pub department_id: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<AssignAppointmentReq> for Assignment {
    type Error = CareError;

    fn try_from(req: AssignAppointmentReq) -> CareResult<Self> {
        Ok(Self {
            doctor: parse::optional_id("doctor_id", req.doctor_id.as_deref())?,
            department: parse::optional_id("department_id", req.department_id.as_deref())?,
            notes: trimmed(req.notes),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AppointmentListQuery {
    /// Only appointments in this status.
    pub status: Option<String>,
    /// Only appointments on this date (`YYYY-MM-DD`).
    pub date: Option<String>,
    /// Only appointments dated today or later.
    pub upcoming: Option<bool>,
    pub hospital: Option<String>,
}

impl TryFrom<AppointmentListQuery> for AppointmentFilter {
    type Error = CareError;

    fn try_from(q: AppointmentListQuery) -> CareResult<Self> {
        Ok(Self {
            status: parse::optional_wire(q.status.as_deref())?,
            date: q.date.as_deref().map(|d| parse::date("date", d)).transpose()?,
            upcoming: q.upcoming.unwrap_or(false),
            hospital: parse::optional_id("hospital", q.hospital.as_deref())?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OperationsQueueQuery {
    /// Status to review; defaults to `REQUESTED`.
    pub status: Option<String>,
}

// ============================================================================
// WALK-INS & QUEUES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueueEntryRes {
    pub id: String,
    pub hospital_id: String,
    pub queue_type: String,
    pub appointment_id: String,
    pub queue_date: String,
    pub queue_number: u32,
    pub estimated_wait_minutes: u32,
    pub called_at: Option<String>,
}

impl From<QueueEntry> for QueueEntryRes {
    fn from(q: QueueEntry) -> Self {
        Self {
            id: q.id.to_string(),
            hospital_id: q.hospital.to_string(),
            queue_type: q.queue_type.to_string(),
            appointment_id: q.appointment.to_string(),
            queue_date: q.queue_date.to_string(),
            queue_number: q.queue_number,
            estimated_wait_minutes: q.estimated_wait_minutes,
            called_at: q.called_at.map(timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalkInReq {
    pub patient_user_id: String,
    pub hospital_id: String,
    /// `OPD` or `EMERGENCY`.
    pub queue_type: String,
    pub doctor_id: Option<String>,
    pub department_id: Option<String>,
    pub reason: String,
    pub priority: Option<String>,
}

impl TryFrom<WalkInReq> for WalkIn {
    type Error = CareError;

    fn try_from(req: WalkInReq) -> CareResult<Self> {
        Ok(Self {
            patient_user: parse::id("patient_user_id", &req.patient_user_id)?,
            hospital: parse::id("hospital_id", &req.hospital_id)?,
            queue_type: parse::wire(&req.queue_type)?,
            doctor: parse::optional_id("doctor_id", req.doctor_id.as_deref())?,
            department: parse::optional_id("department_id", req.department_id.as_deref())?,
            reason: req.reason,
            priority: parse::optional_wire(req.priority.as_deref())?.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalkInRes {
    pub appointment: AppointmentRes,
    pub queue_entry: Option<QueueEntryRes>,
}

impl From<WalkInOutcome> for WalkInRes {
    fn from(o: WalkInOutcome) -> Self {
        Self {
            appointment: o.appointment.into(),
            queue_entry: o.queue_entry.map(Into::into),
        }
    }
}

// ============================================================================
// PRESCRIPTIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescribedMedicineReq {
    pub medicine_id: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecommendedTestReq {
    pub test_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePrescriptionReq {
    pub appointment_id: String,
    pub diagnosis: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub medicines: Vec<PrescribedMedicineReq>,
    #[serde(default)]
    pub lab_tests: Vec<RecommendedTestReq>,
}

impl TryFrom<CreatePrescriptionReq> for NewPrescription {
    type Error = CareError;

    fn try_from(req: CreatePrescriptionReq) -> CareResult<Self> {
        let medicines = req
            .medicines
            .into_iter()
            .map(|m| {
                Ok(PrescribedMedicine {
                    medicine: parse::id("medicine_id", &m.medicine_id)?,
                    dosage: m.dosage,
                    frequency: m.frequency,
                    duration: m.duration,
                    instructions: trimmed(m.instructions),
                    quantity: m.quantity,
                })
            })
            .collect::<CareResult<Vec<_>>>()?;
        Ok(Self {
            appointment: parse::id("appointment_id", &req.appointment_id)?,
            diagnosis: req.diagnosis,
            notes: trimmed(req.notes),
            medicines,
            lab_tests: req
                .lab_tests
                .into_iter()
                .map(|t| RecommendedTest {
                    test_name: t.test_name,
                    description: trimmed(t.description),
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionMedicineRes {
    pub id: String,
    pub line: u32,
    pub medicine_id: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabRecommendationRes {
    pub id: String,
    pub test_name: String,
    pub description: String,
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionRes {
    pub id: String,
    pub appointment_id: String,
    pub emr_id: Option<String>,
    pub patient_id: String,
    pub doctor_id: String,
    pub diagnosis: String,
    pub notes: String,
    pub created_at: String,
    pub medicines: Vec<PrescriptionMedicineRes>,
    pub lab_tests: Vec<LabRecommendationRes>,
}

impl From<PrescriptionDetail> for PrescriptionRes {
    fn from(d: PrescriptionDetail) -> Self {
        let p = d.prescription;
        Self {
            id: p.id.to_string(),
            appointment_id: p.appointment.to_string(),
            emr_id: opt_string(p.emr),
            patient_id: p.patient.to_string(),
            doctor_id: p.doctor.to_string(),
            diagnosis: p.diagnosis.to_string(),
            notes: p.notes,
            created_at: timestamp(p.created_at),
            medicines: d
                .medicines
                .into_iter()
                .map(|m| PrescriptionMedicineRes {
                    id: m.id.to_string(),
                    line: m.line,
                    medicine_id: m.medicine.to_string(),
                    dosage: m.dosage,
                    frequency: m.frequency,
                    duration: m.duration,
                    instructions: m.instructions,
                    quantity: m.quantity,
                })
                .collect(),
            lab_tests: d
                .lab_tests
                .into_iter()
                .map(|t| LabRecommendationRes {
                    id: t.id.to_string(),
                    test_name: t.test_name.to_string(),
                    description: t.description,
                    is_completed: t.is_completed,
                })
                .collect(),
        }
    }
}

// ============================================================================
// PHARMACY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePharmacyOrderReq {
    pub prescription_id: String,
    pub pharmacy_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemRes {
    pub id: String,
    pub prescription_medicine_id: String,
    pub pharmacy_medicine_id: String,
    pub quantity: u32,
    pub unit_price: String,
    pub total_price: String,
}

impl From<PharmacyOrderItem> for OrderItemRes {
    fn from(i: PharmacyOrderItem) -> Self {
        Self {
            id: i.id.to_string(),
            prescription_medicine_id: i.prescription_medicine.to_string(),
            pharmacy_medicine_id: i.pharmacy_medicine.to_string(),
            quantity: i.quantity,
            unit_price: i.unit_price.to_string(),
            total_price: i.total_price.to_string(),
        }
    }
}

/// A prescription line the pharmacy could not fill from stock.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SkippedLineRes {
    pub medicine_id: String,
    pub requested: u32,
    pub available: u32,
}

impl From<SkippedLine> for SkippedLineRes {
    fn from(s: SkippedLine) -> Self {
        Self {
            medicine_id: s.medicine.to_string(),
            requested: s.requested,
            available: s.available,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PharmacyInvoiceRes {
    pub id: String,
    pub invoice_number: String,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub issued_at: String,
}

impl From<PharmacyInvoice> for PharmacyInvoiceRes {
    fn from(i: PharmacyInvoice) -> Self {
        Self {
            id: i.id.to_string(),
            invoice_number: i.invoice_number.to_string(),
            subtotal: i.subtotal.to_string(),
            tax: i.tax.to_string(),
            total: i.total.to_string(),
            issued_at: timestamp(i.issued_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PharmacyOrderRes {
    pub id: String,
    pub prescription_id: String,
    pub pharmacy_id: String,
    pub patient_id: String,
    pub status: String,
    pub total_amount: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub items: Vec<OrderItemRes>,
    #[serde(default)]
    pub skipped: Vec<SkippedLineRes>,
    pub invoice: Option<PharmacyInvoiceRes>,
}

impl From<PharmacyOrder> for PharmacyOrderRes {
    fn from(o: PharmacyOrder) -> Self {
        Self {
            id: o.id.to_string(),
            prescription_id: o.prescription.to_string(),
            pharmacy_id: o.pharmacy.to_string(),
            patient_id: o.patient.to_string(),
            status: o.status.to_string(),
            total_amount: o.total_amount.to_string(),
            created_at: timestamp(o.created_at),
            updated_at: timestamp(o.updated_at),
            items: Vec::new(),
            skipped: Vec::new(),
            invoice: None,
        }
    }
}

impl From<OrderOutcome> for PharmacyOrderRes {
    fn from(o: OrderOutcome) -> Self {
        Self {
            items: o.items.into_iter().map(Into::into).collect(),
            skipped: o.skipped.into_iter().map(Into::into).collect(),
            ..o.order.into()
        }
    }
}

impl From<OrderUpdate> for PharmacyOrderRes {
    fn from(u: OrderUpdate) -> Self {
        Self {
            invoice: u.invoice.map(Into::into),
            ..u.order.into()
        }
    }
}

// ============================================================================
// LABS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateLabRequestReq {
    pub recommendation_id: String,
    pub lab_id: String,
    pub lab_test_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabRequestRes {
    pub id: String,
    pub recommendation_id: String,
    pub lab_id: String,
    pub lab_test_id: Option<String>,
    pub patient_id: String,
    pub status: String,
    pub requested_at: String,
    pub completed_at: Option<String>,
}

impl From<LabTestRequest> for LabRequestRes {
    fn from(r: LabTestRequest) -> Self {
        Self {
            id: r.id.to_string(),
            recommendation_id: r.recommendation.to_string(),
            lab_id: r.lab.to_string(),
            lab_test_id: opt_string(r.lab_test),
            patient_id: r.patient.to_string(),
            status: r.status.to_string(),
            requested_at: timestamp(r.requested_at),
            completed_at: r.completed_at.map(timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadLabReportReq {
    pub report_reference: String,
    pub report_date: String,
    pub findings: Option<String>,
    pub notes: Option<String>,
}

impl TryFrom<UploadLabReportReq> for NewLabReport {
    type Error = CareError;

    fn try_from(req: UploadLabReportReq) -> CareResult<Self> {
        Ok(Self {
            report_reference: req.report_reference,
            report_date: parse::date("report_date", &req.report_date)?,
            findings: trimmed(req.findings),
            notes: trimmed(req.notes),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LabReportRes {
    pub id: String,
    pub request_id: String,
    pub report_reference: String,
    pub report_date: String,
    pub findings: String,
    pub notes: String,
    pub uploaded_by: String,
    pub uploaded_at: String,
}

impl From<LabReport> for LabReportRes {
    fn from(r: LabReport) -> Self {
        Self {
            id: r.id.to_string(),
            request_id: r.request.to_string(),
            report_reference: r.report_reference.to_string(),
            report_date: r.report_date.to_string(),
            findings: r.findings,
            notes: r.notes,
            uploaded_by: r.uploaded_by.to_string(),
            uploaded_at: timestamp(r.uploaded_at),
        }
    }
}

// ============================================================================
// EMR
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateEmrReq {
    pub appointment_id: String,
    pub chief_complaint: String,
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    pub clinical_notes: Option<String>,
}

impl TryFrom<CreateEmrReq> for NewEmr {
    type Error = CareError;

    fn try_from(req: CreateEmrReq) -> CareResult<Self> {
        Ok(Self {
            appointment: parse::id("appointment_id", &req.appointment_id)?,
            chief_complaint: req.chief_complaint,
            diagnosis: trimmed(req.diagnosis),
            treatment_plan: trimmed(req.treatment_plan),
            clinical_notes: trimmed(req.clinical_notes),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VitalsReq {
    /// Degrees Celsius, e.g. `"37.6"`.
    pub temperature_celsius: Option<String>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub notes: Option<String>,
}

impl TryFrom<VitalsReq> for NewVitals {
    type Error = CareError;

    fn try_from(req: VitalsReq) -> CareResult<Self> {
        Ok(Self {
            temperature_celsius: req
                .temperature_celsius
                .as_deref()
                .map(|t| parse::decimal("temperature_celsius", t))
                .transpose()?,
            blood_pressure: req.blood_pressure,
            heart_rate: req.heart_rate,
            oxygen_saturation: req.oxygen_saturation,
            notes: trimmed(req.notes),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VitalsRes {
    pub id: String,
    pub emr_id: String,
    pub recorded_by: String,
    pub temperature_celsius: Option<String>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u16>,
    pub oxygen_saturation: Option<u8>,
    pub notes: String,
    pub recorded_at: String,
}

impl From<VitalsRecord> for VitalsRes {
    fn from(v: VitalsRecord) -> Self {
        Self {
            id: v.id.to_string(),
            emr_id: v.emr.to_string(),
            recorded_by: v.recorded_by.to_string(),
            temperature_celsius: v.temperature_celsius.map(|t| t.to_string()),
            blood_pressure: v.blood_pressure,
            heart_rate: v.heart_rate,
            oxygen_saturation: v.oxygen_saturation,
            notes: v.notes,
            recorded_at: timestamp(v.recorded_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmrRes {
    pub id: String,
    pub patient_id: String,
    pub hospital_id: String,
    pub appointment_id: String,
    pub doctor_id: String,
    pub visit_type: String,
    pub chief_complaint: String,
    pub diagnosis: String,
    pub treatment_plan: String,
    pub clinical_notes: String,
    pub visit_date: String,
    pub created_at: String,
    pub vitals: Option<VitalsRes>,
}

impl From<EmrRecord> for EmrRes {
    fn from(r: EmrRecord) -> Self {
        Self {
            id: r.id.to_string(),
            patient_id: r.patient.to_string(),
            hospital_id: r.hospital.to_string(),
            appointment_id: r.appointment.to_string(),
            doctor_id: r.doctor.to_string(),
            visit_type: r.visit_type.to_string(),
            chief_complaint: r.chief_complaint.to_string(),
            diagnosis: r.diagnosis,
            treatment_plan: r.treatment_plan,
            clinical_notes: r.clinical_notes,
            visit_date: r.visit_date.to_string(),
            created_at: timestamp(r.created_at),
            vitals: None,
        }
    }
}

impl From<HistoryEntry> for EmrRes {
    fn from(e: HistoryEntry) -> Self {
        Self {
            vitals: e.vitals.map(Into::into),
            ..e.record.into()
        }
    }
}

// ============================================================================
// PAYMENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentReq {
    pub payment_type: String,
    pub payment_method: String,
    pub appointment_id: Option<String>,
    pub pharmacy_order_id: Option<String>,
    pub lab_request_id: Option<String>,
    /// Required for bed and OT charges; must match the owed amount when given for others.
    pub amount: Option<String>,
}

impl TryFrom<CreatePaymentReq> for NewPayment {
    type Error = CareError;

    fn try_from(req: CreatePaymentReq) -> CareResult<Self> {
        Ok(Self {
            payment_type: parse::wire(&req.payment_type)?,
            method: parse::wire(&req.payment_method)?,
            appointment: parse::optional_id("appointment_id", req.appointment_id.as_deref())?,
            pharmacy_order: parse::optional_id(
                "pharmacy_order_id",
                req.pharmacy_order_id.as_deref(),
            )?,
            lab_request: parse::optional_id("lab_request_id", req.lab_request_id.as_deref())?,
            amount: req
                .amount
                .as_deref()
                .map(|a| parse::money("amount", a))
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRes {
    pub id: String,
    pub payer_id: String,
    pub hospital_id: Option<String>,
    pub payment_type: String,
    pub amount: String,
    pub platform_commission: String,
    pub hospital_amount: String,
    pub payment_method: String,
    pub status: String,
    pub appointment_id: Option<String>,
    pub pharmacy_order_id: Option<String>,
    pub lab_request_id: Option<String>,
    pub transaction_id: String,
    #[schema(value_type = Option<Object>)]
    pub gateway_response: Option<serde_json::Value>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<Payment> for PaymentRes {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id.to_string(),
            payer_id: p.payer.to_string(),
            hospital_id: opt_string(p.hospital),
            payment_type: p.payment_type.to_string(),
            amount: p.amount.to_string(),
            platform_commission: p.platform_commission.to_string(),
            hospital_amount: p.hospital_amount.to_string(),
            payment_method: p.method.to_string(),
            status: p.status.to_string(),
            appointment_id: opt_string(p.appointment),
            pharmacy_order_id: opt_string(p.pharmacy_order),
            lab_request_id: opt_string(p.lab_request),
            transaction_id: p.transaction_id.to_string(),
            gateway_response: p.gateway_response,
            created_at: timestamp(p.created_at),
            completed_at: p.completed_at.map(timestamp),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentInvoiceRes {
    pub id: String,
    pub payment_id: String,
    pub invoice_number: String,
    pub subtotal: String,
    pub tax: String,
    pub platform_commission: String,
    pub total: String,
    pub issued_at: String,
}

impl From<PaymentInvoice> for PaymentInvoiceRes {
    fn from(i: PaymentInvoice) -> Self {
        Self {
            id: i.id.to_string(),
            payment_id: i.payment.to_string(),
            invoice_number: i.invoice_number.to_string(),
            subtotal: i.subtotal.to_string(),
            tax: i.tax.to_string(),
            platform_commission: i.platform_commission.to_string(),
            total: i.total.to_string(),
            issued_at: timestamp(i.issued_at),
        }
    }
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationRes {
    pub id: String,
    pub channel: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub appointment_id: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl From<Notification> for NotificationRes {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_string(),
            channel: n.channel.as_str().to_string(),
            category: n.category.as_str().to_string(),
            title: n.title,
            body: n.body,
            appointment_id: opt_string(n.appointment),
            status: n.status.as_str().to_string(),
            created_at: timestamp(n.created_at),
        }
    }
}
