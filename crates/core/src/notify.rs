//! Notification queue.
//!
//! Workflow code only enqueues. Delivery status (pending, sent, failed, delivered) is owned
//! by the queue and advanced by whatever delivers the messages.

use carelink_ids::RecordId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    Sms,
    Email,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    AppointmentReminder,
    AppointmentConfirmed,
    AppointmentCancelled,
    PrescriptionReady,
    LabReportReady,
    PaymentSuccess,
    PaymentFailed,
    MedicineDispatched,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "SMS",
            Self::Email => "EMAIL",
            Self::Push => "PUSH",
        }
    }
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppointmentReminder => "APPOINTMENT_REMINDER",
            Self::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            Self::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            Self::PrescriptionReady => "PRESCRIPTION_READY",
            Self::LabReportReady => "LAB_REPORT_READY",
            Self::PaymentSuccess => "PAYMENT_SUCCESS",
            Self::PaymentFailed => "PAYMENT_FAILED",
            Self::MedicineDispatched => "MEDICINE_DISPATCHED",
            Self::General => "GENERAL",
        }
    }
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
            Self::Delivered => "DELIVERED",
        }
    }
}

/// What a workflow asks to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub recipient: RecordId,
    pub channel: NotificationChannel,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub appointment: Option<RecordId>,
}

impl NotificationRequest {
    /// A push notification; the default channel for workflow events.
    pub fn push(
        recipient: RecordId,
        category: NotificationCategory,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            channel: NotificationChannel::Push,
            category,
            title: title.into(),
            body: body.into(),
            appointment: None,
        }
    }

    pub fn for_appointment(mut self, appointment: RecordId) -> Self {
        self.appointment = Some(appointment);
        self
    }
}

/// A queued notification and its delivery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    pub recipient: RecordId,
    pub channel: NotificationChannel,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub appointment: Option<RecordId>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

pub trait NotificationSink: Send + Sync {
    fn enqueue(&self, request: NotificationRequest);

    /// Notifications addressed to `recipient`, oldest first.
    fn for_recipient(&self, recipient: RecordId) -> Vec<Notification>;
}

#[derive(Debug, Default)]
pub struct InMemoryNotificationQueue {
    items: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Vec<Notification> {
        self.snapshot()
            .into_iter()
            .filter(|n| n.status == DeliveryStatus::Pending)
            .collect()
    }

    /// Marks a pending notification as handed to its channel. Returns false if unknown.
    pub fn mark_sent(&self, id: RecordId) -> bool {
        self.update(id, |n| {
            n.status = DeliveryStatus::Sent;
            n.sent_at = Some(Utc::now());
        })
    }

    pub fn mark_failed(&self, id: RecordId, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        self.update(id, |n| {
            n.status = DeliveryStatus::Failed;
            n.failure_reason = Some(reason);
        })
    }

    pub fn mark_delivered(&self, id: RecordId) -> bool {
        self.update(id, |n| {
            n.status = DeliveryStatus::Delivered;
            n.delivered_at = Some(Utc::now());
        })
    }

    fn snapshot(&self) -> Vec<Notification> {
        self.items
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    fn update(&self, id: RecordId, change: impl FnOnce(&mut Notification)) -> bool {
        let Ok(mut items) = self.items.lock() else {
            tracing::warn!(%id, "notification queue lock poisoned");
            return false;
        };
        match items.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                change(n);
                true
            }
            None => false,
        }
    }
}

impl NotificationSink for InMemoryNotificationQueue {
    fn enqueue(&self, request: NotificationRequest) {
        let notification = Notification {
            id: RecordId::new(),
            recipient: request.recipient,
            channel: request.channel,
            category: request.category,
            title: request.title,
            body: request.body,
            appointment: request.appointment,
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
            sent_at: None,
            delivered_at: None,
            failure_reason: None,
        };
        tracing::debug!(recipient = %notification.recipient, category = ?notification.category, "notification queued");
        match self.items.lock() {
            Ok(mut items) => items.push(notification),
            Err(_) => tracing::warn!("notification queue lock poisoned; notification dropped"),
        }
    }

    fn for_recipient(&self, recipient: RecordId) -> Vec<Notification> {
        self.snapshot()
            .into_iter()
            .filter(|n| n.recipient == recipient)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueued_notifications_start_pending() {
        let queue = InMemoryNotificationQueue::new();
        let user = RecordId::new();
        queue.enqueue(NotificationRequest::push(
            user,
            NotificationCategory::AppointmentConfirmed,
            "Appointment confirmed",
            "See you tomorrow",
        ));

        let pending = queue.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].recipient, user);
        assert_eq!(pending[0].channel, NotificationChannel::Push);
    }

    #[test]
    fn test_delivery_status_transitions() {
        let queue = InMemoryNotificationQueue::new();
        let user = RecordId::new();
        queue.enqueue(NotificationRequest::push(user, NotificationCategory::General, "a", "b"));
        queue.enqueue(NotificationRequest::push(user, NotificationCategory::General, "c", "d"));
        let ids: Vec<_> = queue.for_recipient(user).iter().map(|n| n.id).collect();

        assert!(queue.mark_sent(ids[0]));
        assert!(queue.mark_delivered(ids[0]));
        assert!(queue.mark_failed(ids[1], "no device token"));
        assert!(!queue.mark_sent(RecordId::new()));

        let all = queue.for_recipient(user);
        assert_eq!(all[0].status, DeliveryStatus::Delivered);
        assert!(all[0].sent_at.is_some());
        assert_eq!(all[1].status, DeliveryStatus::Failed);
        assert_eq!(all[1].failure_reason.as_deref(), Some("no device token"));
        assert!(queue.pending().is_empty());
    }
}
