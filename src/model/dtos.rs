use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// HTTP verbs the dispatcher accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call retry settings for `RequestDispatcher::send`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Retry 4xx rejections too (403, 404, ...). Off by default.
    pub retry_client_errors: bool,
}

impl RequestOptions {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

    /// One attempt, no backoff. Used when replaying the offline queue.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
            retry_client_errors: false,
        }
    }
}

/// Anti-forgery header supplied by the hosting page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntiForgeryToken {
    pub header_name: String,
    pub value: String,
}

/// Fully built request handed to a `Transport`
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl OutgoingRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and raw body as returned by a `Transport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body of `POST /enroll`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub course_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voucher_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub agree_to_terms: bool,
}

impl EnrollmentRequest {
    pub fn for_course(course_id: i64) -> Self {
        Self {
            course_id,
            ..Self::default()
        }
    }
}

/// Body of `POST /validate-voucher`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherQuery<'a> {
    pub voucher_code: &'a str,
    pub course_id: i64,
}

/// Body of `POST /withdraw/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalRequest<'a> {
    pub reason: &'a str,
}
