//! Best-effort analytics.
//!
//! Tracking never blocks and never fails from the caller's point of view:
//! records go onto an unbounded channel and a `TelemetryOutbox` posts them
//! once each. Delivery errors are logged and dropped.

use crate::error::Error;
use crate::interface::Transport;
use crate::model::dtos::{HttpMethod, OutgoingRequest};
use chrono::{DateTime, Utc};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum TelemetryRecord {
    Event(EventData),
    Error(ErrorData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub name: String,
    pub properties: Value,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    pub context: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// Cloneable tracking handle
#[derive(Debug, Clone)]
pub struct Telemetry {
    sender: Option<UnboundedSender<TelemetryRecord>>,
    session_id: String,
}

impl Telemetry {
    /// Handle plus the outbox that delivers its records to `endpoint`
    pub fn channel(session_id: impl Into<String>, endpoint: impl Into<String>) -> (Self, TelemetryOutbox) {
        let (sender, receiver) = unbounded();
        let telemetry = Self {
            sender: Some(sender),
            session_id: session_id.into(),
        };
        let outbox = TelemetryOutbox {
            receiver,
            endpoint: endpoint.into(),
        };
        (telemetry, outbox)
    }

    pub fn disabled() -> Self {
        Self {
            sender: None,
            session_id: new_session_id(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn track_event(&self, name: &str, properties: Value) {
        self.push(TelemetryRecord::Event(EventData {
            name: name.to_string(),
            properties,
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
        }));
    }

    pub fn track_error(&self, context: &str, error: &Error) {
        self.push(TelemetryRecord::Error(ErrorData {
            context: context.to_string(),
            message: error.to_string(),
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
        }));
    }

    fn push(&self, record: TelemetryRecord) {
        if let Some(sender) = &self.sender {
            if sender.unbounded_send(record).is_err() {
                log::debug!("telemetry outbox closed, record dropped");
            }
        }
    }
}

/// Receiving half; drive `deliver` somewhere that does not block the UI.
#[derive(Debug)]
pub struct TelemetryOutbox {
    receiver: UnboundedReceiver<TelemetryRecord>,
    endpoint: String,
}

impl TelemetryOutbox {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post records until every `Telemetry` handle is dropped.
    /// Returns how many were accepted by the server.
    pub async fn deliver<T: Transport>(mut self, transport: &T) -> usize {
        let mut delivered = 0;
        while let Some(record) = self.receiver.next().await {
            if post(transport, &self.endpoint, &record).await {
                delivered += 1;
            }
        }
        delivered
    }
}

async fn post<T: Transport>(transport: &T, endpoint: &str, record: &TelemetryRecord) -> bool {
    let body = match serde_json::to_string(record) {
        Ok(body) => body,
        Err(e) => {
            log::debug!("telemetry record not serializable: {e}");
            return false;
        }
    };
    let request = OutgoingRequest {
        method: HttpMethod::Post,
        url: endpoint.to_string(),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: Some(body),
    };

    match transport.perform_request(&request).await {
        Ok(resp) if resp.is_success() => true,
        Ok(resp) => {
            log::debug!("analytics tracking rejected: status {}", resp.status);
            false
        }
        Err(e) => {
            log::debug!("analytics tracking failed: {e}");
            false
        }
    }
}

/// `session_<unix millis>_<9 random chars>`
pub fn new_session_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{Reply, ScriptedTransport};
    use serde_json::json;

    #[test]
    fn test_session_id_shape() {
        let id = new_session_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_event_wire_format() {
        let record = TelemetryRecord::Event(EventData {
            name: "enrollment_completed".to_string(),
            properties: json!({"courseId": 4, "source": "web"}),
            timestamp: "2026-01-02T03:04:05Z".parse().unwrap(),
            session_id: "session_1_abcdefghi".to_string(),
        });

        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(wire["type"], "event");
        assert_eq!(wire["data"]["name"], "enrollment_completed");
        assert_eq!(wire["data"]["properties"]["courseId"], 4);
        assert_eq!(wire["data"]["sessionId"], "session_1_abcdefghi");
        assert_eq!(wire["data"]["timestamp"], "2026-01-02T03:04:05Z");
    }

    #[tokio::test]
    async fn test_outbox_posts_each_record_once_and_ignores_failures() {
        let (telemetry, outbox) = Telemetry::channel("session_1_abcdefghi", "http://lms.test/analytics/track");
        telemetry.track_event("page_view", json!({"page": "/enrollment/course/1"}));
        telemetry.track_error(
            "Enrollment failed",
            &ErrorKind::Transport("offline".to_string()).into(),
        );
        telemetry.track_event("enrollment_withdrawn", json!({"enrollmentId": 2}));
        drop(telemetry);

        let transport = ScriptedTransport::new(
            vec![Reply::ok(""), Reply::down(), Reply::status(500)],
            Reply::ok(""),
        );
        let delivered = outbox.deliver(&transport).await;

        assert_eq!(delivered, 1);
        assert_eq!(transport.calls(), 3);
        let sent = transport.requests();
        assert!(sent.iter().all(|r| r.url == "http://lms.test/analytics/track"));
        let second: Value = serde_json::from_str(sent[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(second["type"], "error");
        assert_eq!(second["data"]["context"], "Enrollment failed");
        assert_eq!(second["data"]["message"], "TransportError: offline");
    }

    #[test]
    fn test_tracking_survives_dropped_outbox() {
        let (telemetry, outbox) = Telemetry::channel("s", "http://lms.test/analytics/track");
        drop(outbox);
        telemetry.track_event("page_view", Value::Null);
        Telemetry::disabled().track_event("page_view", Value::Null);
    }
}
