use super::EnrollmentContext;
use crate::error::{ErrorKind, Result};
use crate::interface::{Delay, QueueStore, Transport};
use crate::model::dtos::{EnrollmentRequest, HttpMethod, VoucherQuery, WithdrawalRequest};
use crate::model::structs::{
    ApiReply, CapacityInfo, EnrollReply, EnrollmentOutcome, NoticeLevel, PaymentResult,
    PrerequisiteCheck, UiEvent, VoucherValidation, WithdrawalOutcome, WriteOutcome,
};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

pub const CAPACITY_POLL_INTERVAL: Duration = Duration::from_secs(30);

impl<T: Transport, D: Delay, S: QueueStore> EnrollmentContext<T, D, S> {
    /// Enroll in a course, bracketed by `Loading(true)` / `Loading(false)`.
    pub async fn enroll_in_course(&self, request: &EnrollmentRequest) -> Result<EnrollmentOutcome> {
        self.emit(UiEvent::Loading(true));
        let result = self.enroll(request).await;
        self.emit(UiEvent::Loading(false));

        if let Err(e) = &result {
            self.report_failure("Enrollment failed", e);
        }
        result
    }

    async fn enroll(&self, request: &EnrollmentRequest) -> Result<EnrollmentOutcome> {
        let payload = serde_json::to_value(request)?;
        let reply: EnrollReply = match self
            .send_or_queue(HttpMethod::Post, "/enroll", Some(payload))
            .await?
        {
            WriteOutcome::Queued { id } => return Ok(EnrollmentOutcome::Queued { id }),
            WriteOutcome::Completed(value) => decode_reply(value)?,
        };

        let message = reply.message.clone().unwrap_or_default();
        if !reply.success {
            self.notify(NoticeLevel::Error, message.clone());
            return Ok(EnrollmentOutcome::Rejected { message });
        }

        let payment_id = match (reply.payment_required, &reply.payment) {
            (true, Some(payment)) => Some(payment.id),
            (true, None) => {
                return Err(ErrorKind::Decode(
                    "payment required but no payment in reply".to_string(),
                )
                .into())
            }
            (false, _) => None,
        };

        self.telemetry().track_event(
            "enrollment_completed",
            json!({"courseId": request.course_id, "source": "web"}),
        );

        let outcome = if let Some(payment_id) = payment_id {
            self.emit(UiEvent::PaymentRequired { payment_id });
            EnrollmentOutcome::PaymentRequired { payment_id }
        } else if reply.requires_approval {
            self.notify(NoticeLevel::Info, message.clone());
            EnrollmentOutcome::PendingApproval { message }
        } else if reply.waitlisted {
            self.notify(NoticeLevel::Warning, waitlist_message(reply.waitlist_position));
            EnrollmentOutcome::Waitlisted {
                position: reply.waitlist_position,
            }
        } else {
            let enrollment_id = reply.enrollment.as_ref().map(|e| e.id);
            self.notify(NoticeLevel::Success, message.clone());
            if let Some(enrollment_id) = enrollment_id {
                self.emit(UiEvent::EnrollmentConfirmed { enrollment_id });
            }
            EnrollmentOutcome::Enrolled {
                enrollment_id,
                message,
            }
        };
        Ok(outcome)
    }

    /// Prerequisite status; any failure reads as "not met".
    pub async fn validate_prerequisites(&self, course_id: i64) -> PrerequisiteCheck {
        let endpoint = format!("/prerequisites/{course_id}");
        match self.fetch::<PrerequisiteCheck>(&endpoint).await {
            Ok(check) => check,
            Err(e) => {
                log::error!("Error validating prerequisites: {e}");
                PrerequisiteCheck::default()
            }
        }
    }

    pub async fn check_capacity(&self, course_id: i64) -> Option<CapacityInfo> {
        let endpoint = format!("/capacity/{course_id}");
        match self.fetch::<CapacityInfo>(&endpoint).await {
            Ok(capacity) => {
                self.emit(UiEvent::CapacityUpdated(capacity.clone()));
                Some(capacity)
            }
            Err(e) => {
                log::error!("Error checking capacity: {e}");
                None
            }
        }
    }

    /// Poll capacity every `interval`, first result after one interval.
    /// Dropping the stream stops the polling.
    pub fn capacity_updates(
        &self,
        course_id: i64,
        interval: Duration,
    ) -> impl Stream<Item = Option<CapacityInfo>> + '_ {
        futures::stream::unfold((), move |()| async move {
            self.dispatcher().delay().sleep(interval).await;
            Some((self.check_capacity(course_id).await, ()))
        })
    }

    pub async fn validate_voucher(&self, voucher_code: &str, course_id: i64) -> VoucherValidation {
        let query = VoucherQuery {
            voucher_code,
            course_id,
        };
        let result = match serde_json::to_value(&query) {
            Ok(payload) => self
                .send(HttpMethod::Post, "/validate-voucher", Some(&payload))
                .await
                .and_then(decode_reply::<VoucherValidation>),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(validation) => {
                if validation.valid {
                    self.emit(UiEvent::VoucherApplied {
                        discount: validation.discount,
                    });
                }
                validation
            }
            Err(e) => {
                log::error!("Error validating voucher: {e}");
                VoucherValidation {
                    valid: false,
                    message: "Error validating voucher code".to_string(),
                    discount: 0.0,
                }
            }
        }
    }

    pub async fn withdraw_from_course(
        &self,
        enrollment_id: i64,
        reason: &str,
    ) -> Result<WithdrawalOutcome> {
        let result = self.withdraw(enrollment_id, reason).await;
        if let Err(e) = &result {
            self.report_failure("Withdrawal failed", e);
        }
        result
    }

    async fn withdraw(&self, enrollment_id: i64, reason: &str) -> Result<WithdrawalOutcome> {
        let payload = serde_json::to_value(WithdrawalRequest { reason })?;
        let endpoint = format!("/withdraw/{enrollment_id}");

        let reply: ApiReply = match self
            .send_or_queue(HttpMethod::Post, &endpoint, Some(payload))
            .await?
        {
            WriteOutcome::Queued { id } => return Ok(WithdrawalOutcome::Queued { id }),
            WriteOutcome::Completed(value) => decode_reply(value)?,
        };

        if reply.success {
            self.telemetry()
                .track_event("enrollment_withdrawn", json!({"enrollmentId": enrollment_id}));
            let message = "Successfully withdrawn from course".to_string();
            self.notify(NoticeLevel::Success, message.clone());
            Ok(WithdrawalOutcome::Withdrawn { message })
        } else {
            self.notify(NoticeLevel::Error, reply.message.clone());
            Ok(WithdrawalOutcome::Rejected {
                message: reply.message,
            })
        }
    }

    /// Submit a form's fields as JSON to its action URL.
    pub async fn submit_form(&self, action: &str, fields: Value) -> Result<ApiReply> {
        let result = self
            .send(HttpMethod::Post, action, Some(&fields))
            .await
            .and_then(decode_reply::<ApiReply>);

        match &result {
            Ok(reply) if reply.success => self.notify(NoticeLevel::Success, reply.message.clone()),
            Ok(reply) => self.notify(NoticeLevel::Error, reply.message.clone()),
            Err(e) => self.report_failure("Form submission failed", e),
        }
        result
    }

    /// Called by the payment page once checkout finished.
    pub fn handle_payment_complete(&self, result: &PaymentResult) {
        if result.success {
            self.telemetry().track_event(
                "payment_completed",
                json!({"paymentId": result.payment_id, "amount": result.amount}),
            );
            self.notify(NoticeLevel::Success, "Payment completed successfully!");
            if let Some(enrollment_id) = result.enrollment_id {
                self.emit(UiEvent::EnrollmentConfirmed { enrollment_id });
            }
        } else {
            let reason = result.message.as_deref().unwrap_or("unknown error");
            self.notify(NoticeLevel::Error, format!("Payment failed: {reason}"));
        }
    }

    async fn fetch<R: DeserializeOwned + Default>(&self, endpoint: &str) -> Result<R> {
        let value = self.send(HttpMethod::Get, endpoint, None).await?;
        decode_reply(value)
    }
}

/// `null` bodies decode to the reply's default
fn decode_reply<R: DeserializeOwned + Default>(value: Value) -> Result<R> {
    if value.is_null() {
        return Ok(R::default());
    }
    Ok(serde_json::from_value(value)?)
}

fn waitlist_message(position: Option<u32>) -> String {
    match position {
        Some(position) => format!("You've been added to the waitlist (Position: {position})"),
        None => "You've been added to the waitlist".to_string(),
    }
}
