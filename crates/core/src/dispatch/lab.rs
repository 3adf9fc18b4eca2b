//! Lab test requests raised from a prescription's recommendations, and their reports.

use crate::audit::AuditEvent;
use crate::constants::resource;
use crate::identity::Actor;
use crate::model::{LabReport, LabRequestStatus, LabTestRequest};
use crate::notify::{NotificationCategory, NotificationRequest};
use crate::policy::{authorize, AccessScope, Operation};
use crate::store::{TableExt, Tables};
use crate::workflow::transitions::check_transition;
use crate::{CareError, CareResult, CoreContext};
use carelink_ids::RecordId;
use carelink_types::NonEmptyText;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct NewLabReport {
    /// Where the report document lives (file name, URL or accession number).
    pub report_reference: String,
    pub report_date: NaiveDate,
    pub findings: String,
    pub notes: String,
}

fn require_lab_admin(tables: &Tables, actor: &Actor, lab: RecordId) -> CareResult<()> {
    if AccessScope::resolve(tables, actor).lab == Some(lab) {
        Ok(())
    } else {
        Err(CareError::permission("this request belongs to another lab"))
    }
}

#[derive(Clone)]
pub struct LabService {
    ctx: Arc<CoreContext>,
}

impl LabService {
    pub fn new(ctx: Arc<CoreContext>) -> Self {
        Self { ctx }
    }

    /// Raises a request at `lab` for one of a prescription's recommended tests.
    ///
    /// # Errors
    ///
    /// - [`CareError::Permission`] unless the actor owns the prescription or administers
    ///   the lab.
    /// - [`CareError::Validation`] if the lab is inactive or the test is not offered there.
    /// - [`CareError::StateConflict`] if the recommendation is already completed.
    pub fn create_request(
        &self,
        actor: &Actor,
        recommendation: RecordId,
        lab: RecordId,
        lab_test: Option<RecordId>,
    ) -> CareResult<LabTestRequest> {
        authorize(actor, Operation::CreateLabRequest)?;
        let now = Utc::now();

        let request = self.ctx.store().transaction(|t| {
            let rec = t.lab_recommendations.fetch(recommendation)?;
            let patient = t.prescriptions.fetch(rec.prescription)?.patient;
            let facility = t.labs.fetch(lab)?;
            let scope = AccessScope::resolve(t, actor);
            if !scope.owns_patient(patient) && scope.lab != Some(lab) {
                return Err(CareError::permission(
                    "only the patient or the lab may raise this request",
                ));
            }
            if !facility.is_active {
                return Err(CareError::validation(format!("{} is not active", facility.name)));
            }
            if rec.is_completed {
                return Err(CareError::conflict("this test has already been completed"));
            }
            if let Some(test) = lab_test {
                let offered = t.lab_tests.fetch(test)?;
                if offered.lab != lab || !offered.is_available {
                    return Err(CareError::validation(format!(
                        "{} is not offered by this lab",
                        offered.name
                    )));
                }
            }

            let request = LabTestRequest {
                id: RecordId::new(),
                recommendation,
                lab,
                lab_test,
                patient,
                status: LabRequestStatus::Pending,
                requested_at: now,
                completed_at: None,
            };
            t.lab_requests.put(request.clone());
            Ok(request)
        })?;

        tracing::info!(request = %request.id, %lab, "lab request created");
        self.ctx.record(AuditEvent::new(
            actor,
            "LAB_REQUEST_CREATED",
            resource::LAB_REQUEST,
            request.id,
        ));
        Ok(request)
    }

    pub fn update_request_status(
        &self,
        actor: &Actor,
        request: RecordId,
        status: LabRequestStatus,
    ) -> CareResult<LabTestRequest> {
        authorize(actor, Operation::UpdateLabRequest)?;
        let now = Utc::now();

        let saved = self.ctx.store().transaction(|t| {
            let current = t.lab_requests.fetch(request)?;
            require_lab_admin(t, actor, current.lab)?;
            check_transition(current.status, status)?;

            let req = t.lab_requests.fetch_mut(request)?;
            req.status = status;
            if status == LabRequestStatus::Completed {
                req.completed_at = Some(now);
            }
            Ok(req.clone())
        })?;

        tracing::info!(%request, %status, "lab request updated");
        self.ctx.record(AuditEvent::new(
            actor,
            format!("LAB_REQUEST_{}", status.as_str()),
            resource::LAB_REQUEST,
            request,
        ));
        Ok(saved)
    }

    /// Attaches the report, completing the request and its recommendation.
    ///
    /// # Errors
    ///
    /// - [`CareError::StateConflict`] if the request was cancelled or already has a report.
    pub fn upload_report(
        &self,
        actor: &Actor,
        request: RecordId,
        report: NewLabReport,
    ) -> CareResult<LabReport> {
        authorize(actor, Operation::UploadLabReport)?;
        let reference = NonEmptyText::new(&report.report_reference)
            .map_err(|_| CareError::validation("a report reference is required"))?;
        let now = Utc::now();

        let (saved, patient_user) = self.ctx.store().transaction(|t| {
            let current = t.lab_requests.fetch(request)?.clone();
            require_lab_admin(t, actor, current.lab)?;
            if current.status == LabRequestStatus::Cancelled {
                return Err(CareError::conflict("cannot report on a cancelled request"));
            }
            if t.lab_reports.values().any(|r| r.request == request) {
                return Err(CareError::conflict("this request already has a report"));
            }

            let saved = LabReport {
                id: RecordId::new(),
                request,
                report_reference: reference,
                report_date: report.report_date,
                findings: report.findings.trim().to_string(),
                notes: report.notes.trim().to_string(),
                uploaded_by: actor.user_id,
                uploaded_at: now,
            };
            t.lab_reports.put(saved.clone());

            let req = t.lab_requests.fetch_mut(request)?;
            req.status = LabRequestStatus::Completed;
            req.completed_at.get_or_insert(now);
            t.lab_recommendations
                .fetch_mut(current.recommendation)?
                .is_completed = true;

            Ok((saved, t.patient_user(current.patient)?))
        })?;

        tracing::info!(%request, report = %saved.id, "lab report uploaded");
        self.ctx.record(AuditEvent::new(
            actor,
            "LAB_REPORT_UPLOADED",
            resource::LAB_REPORT,
            saved.id,
        ));
        self.ctx.notify(NotificationRequest::push(
            patient_user,
            NotificationCategory::LabReportReady,
            "Lab report ready",
            "Your lab report has been uploaded.",
        ));
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn report() -> NewLabReport {
        NewLabReport {
            report_reference: "reports/cbc-0001.pdf".into(),
            report_date: Utc::now().date_naive(),
            findings: "Within normal limits".into(),
            notes: String::new(),
        }
    }

    fn requested(fx: &Fixture) -> (RecordId, LabTestRequest) {
        let (_, rx) = fx.prescribed();
        let recommendation = rx.lab_tests[0].id;
        let request = LabService::new(fx.ctx.clone())
            .create_request(&fx.patient, recommendation, fx.lab, Some(fx.lab_test))
            .expect("create lab request");
        (recommendation, request)
    }

    #[test]
    fn test_patient_raises_request_for_own_recommendation() {
        let fx = Fixture::new();
        let (_, request) = requested(&fx);
        assert_eq!(request.status, LabRequestStatus::Pending);
        assert_eq!(request.lab_test, Some(fx.lab_test));
        assert_eq!(fx.audit_actions(request.id), vec!["LAB_REQUEST_CREATED"]);

        let (_, rx) = fx.prescribed();
        let err = LabService::new(fx.ctx.clone())
            .create_request(&fx.other_patient, rx.lab_tests[0].id, fx.lab, None)
            .expect_err("not their prescription");
        assert!(matches!(err, CareError::Permission(_)));
    }

    #[test]
    fn test_status_walks_the_graph() {
        let fx = Fixture::new();
        let (_, request) = requested(&fx);
        let svc = LabService::new(fx.ctx.clone());

        let err = svc
            .update_request_status(&fx.lab_admin, request.id, LabRequestStatus::Completed)
            .expect_err("pending cannot complete directly");
        assert!(matches!(err, CareError::StateConflict(_)));

        svc.update_request_status(&fx.lab_admin, request.id, LabRequestStatus::InProgress)
            .expect("start");
        let done = svc
            .update_request_status(&fx.lab_admin, request.id, LabRequestStatus::Completed)
            .expect("complete");
        assert!(done.completed_at.is_some());
        assert_eq!(
            fx.audit_actions(request.id),
            vec![
                "LAB_REQUEST_CREATED",
                "LAB_REQUEST_IN_PROGRESS",
                "LAB_REQUEST_COMPLETED"
            ]
        );
    }

    #[test]
    fn test_report_completes_request_and_recommendation() {
        let fx = Fixture::new();
        let (recommendation, request) = requested(&fx);
        let svc = LabService::new(fx.ctx.clone());
        svc.update_request_status(&fx.lab_admin, request.id, LabRequestStatus::InProgress)
            .expect("start");
        svc.upload_report(&fx.lab_admin, request.id, report())
            .expect("upload report");

        let (status, completed) = fx
            .ctx
            .store()
            .read(|t| {
                Ok((
                    t.lab_requests.fetch(request.id)?.status,
                    t.lab_recommendations.fetch(recommendation)?.is_completed,
                ))
            })
            .expect("read");
        assert_eq!(status, LabRequestStatus::Completed);
        assert!(completed);

        let err = svc
            .upload_report(&fx.lab_admin, request.id, report())
            .expect_err("one report per request");
        assert!(matches!(err, CareError::StateConflict(_)));

        let err = svc
            .create_request(&fx.patient, recommendation, fx.lab, None)
            .expect_err("recommendation already completed");
        assert!(matches!(err, CareError::StateConflict(_)));

        let notified = fx
            .ctx
            .notifications()
            .for_recipient(fx.patient.user_id)
            .into_iter()
            .any(|n| n.category == NotificationCategory::LabReportReady);
        assert!(notified);
    }

    #[test]
    fn test_other_lab_cannot_touch_request() {
        let fx = Fixture::new();
        let (_, request) = requested(&fx);
        let err = LabService::new(fx.ctx.clone())
            .upload_report(&fx.super_admin, request.id, report())
            .expect_err("super admin is not a lab admin");
        assert!(matches!(err, CareError::Permission(_)));
    }
}
