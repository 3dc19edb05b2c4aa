//! Scripted doubles for the transport, timer and UI seams

use crate::error::{ErrorKind, Result};
use crate::interface::{Delay, EventSink, Transport};
use crate::model::dtos::{OutgoingRequest, RawResponse};
use crate::model::structs::UiEvent;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted transport answer
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Fail(String),
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Status(200, body.to_string())
    }

    pub fn status(status: u16) -> Self {
        Reply::Status(status, String::new())
    }

    pub fn down() -> Self {
        Reply::Fail("connection refused".to_string())
    }
}

type Rule = Box<dyn Fn(&OutgoingRequest) -> Option<Reply> + Send + Sync>;

/// Answers from a queue of replies, falling back to a default once drained.
/// Rules are consulted first and can match on the request.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Reply>>>,
    fallback: Reply,
    rules: Arc<Mutex<Vec<Rule>>>,
    seen: Arc<Mutex<Vec<OutgoingRequest>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Reply>, fallback: Reply) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback,
            rules: Arc::new(Mutex::new(Vec::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(reply: Reply) -> Self {
        Self::new(Vec::new(), reply)
    }

    pub fn with_rule(
        self,
        rule: impl Fn(&OutgoingRequest) -> Option<Reply> + Send + Sync + 'static,
    ) -> Self {
        self.rules.lock().unwrap().push(Box::new(rule));
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<OutgoingRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn perform_request(&self, request: &OutgoingRequest) -> Result<RawResponse> {
        self.seen.lock().unwrap().push(request.clone());

        let ruled = self.rules.lock().unwrap().iter().find_map(|rule| rule(request));
        let reply = ruled
            .or_else(|| self.script.lock().unwrap().pop_front())
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Status(status, body) => Ok(RawResponse { status, body }),
            Reply::Fail(message) => Err(ErrorKind::Transport(message).into()),
        }
    }
}

/// Records requested delays and returns immediately
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingDelay {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Delay for RecordingDelay {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingEvents {
    events: Arc<Mutex<Vec<UiEvent>>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}
