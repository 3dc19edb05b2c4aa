use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dtos::HttpMethod;

/// One deferred write waiting in the offline queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    pub id: String,
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(default)]
    pub payload: Option<Value>,
    pub enqueued_at: DateTime<Utc>,
}

/// Outcome of replaying the offline queue, ids in queue order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }
}

/// Result of a write that may have been parked offline
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    Completed(Value),
    Queued { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Everything the UI layer is told about
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Loading(bool),
    Notice { level: NoticeLevel, message: String },
    Connectivity(Connectivity),
    OperationQueued { id: String },
    FlushFinished(FlushReport),
    CapacityUpdated(CapacityInfo),
    VoucherApplied { discount: f64 },
    PaymentRequired { payment_id: i64 },
    EnrollmentConfirmed { enrollment_id: i64 },
    SessionExpired,
}

impl UiEvent {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        UiEvent::Notice {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: i64,
}

/// Raw reply of `POST /enroll`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrollReply {
    pub success: bool,
    pub message: Option<String>,
    pub enrollment: Option<EntityRef>,
    pub payment_required: bool,
    pub payment: Option<EntityRef>,
    pub requires_approval: bool,
    pub waitlisted: bool,
    pub waitlist_position: Option<u32>,
}

/// What an enrollment attempt ended up as
#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentOutcome {
    Enrolled {
        enrollment_id: Option<i64>,
        message: String,
    },
    PaymentRequired {
        payment_id: i64,
    },
    PendingApproval {
        message: String,
    },
    Waitlisted {
        position: Option<u32>,
    },
    Rejected {
        message: String,
    },
    Queued {
        id: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapacityInfo {
    pub capacity: Option<i32>,
    pub enrolled: i64,
    pub available: Option<i32>,
    pub waitlist_size: i64,
    pub is_at_capacity: bool,
}

impl CapacityInfo {
    /// Enrolled share of the capacity in percent, if the course is capped
    pub fn fill_percent(&self) -> Option<f64> {
        match self.capacity {
            Some(capacity) if capacity > 0 => Some(self.enrolled as f64 / capacity as f64 * 100.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseSummary {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrerequisiteCheck {
    pub met: bool,
    pub missing: Vec<CourseSummary>,
    pub completed: Vec<CourseSummary>,
    pub can_request_waiver: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoucherValidation {
    pub valid: bool,
    pub message: String,
    pub discount: f64,
}

/// `{success, message}` reply shared by withdraw and form endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiReply {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawalOutcome {
    Withdrawn { message: String },
    Rejected { message: String },
    Queued { id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentResult {
    pub success: bool,
    pub payment_id: Option<i64>,
    pub amount: Option<f64>,
    pub enrollment_id: Option<i64>,
    pub message: Option<String>,
}
