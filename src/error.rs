pub type Result<T> = core::result::Result<T, Error>;

pub struct Error {
    pub inner: Box<ErrorKind>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Error {
        Error {
            inner: Box::new(kind),
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.inner
    }

    /// HTTP status of the failure, looking through `Exhausted` to its last cause.
    pub fn status(&self) -> Option<u16> {
        match self.kind() {
            ErrorKind::Http { status } => Some(*status),
            ErrorKind::Exhausted { last_cause, .. } => last_cause.status(),
            _ => None,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            #[cfg(feature = "no-wasm")]
            ErrorKind::ReqwestError(_) => true,
            #[cfg(feature = "wasm")]
            ErrorKind::GlooNetError(_) => true,
            ErrorKind::Transport(_) | ErrorKind::Decode(_) => true,
            ErrorKind::Http { status } => !is_client_rejection(*status),
            _ => false,
        }
    }

    /// Connection-level failure, as opposed to a server answer.
    pub fn is_network(&self) -> bool {
        match self.kind() {
            #[cfg(feature = "no-wasm")]
            ErrorKind::ReqwestError(_) => true,
            #[cfg(feature = "wasm")]
            ErrorKind::GlooNetError(_) => true,
            ErrorKind::Transport(_) => true,
            ErrorKind::Exhausted { last_cause, .. } => last_cause.is_network(),
            _ => false,
        }
    }

    /// Whether a failed write should be parked in the offline queue.
    ///
    /// A success status with an undecodable body means the server took the
    /// write, so it is never parked.
    pub fn is_queueable(&self) -> bool {
        match self.kind() {
            ErrorKind::Exhausted { last_cause, .. } => match last_cause.kind() {
                ErrorKind::Decode(_) => false,
                _ => last_cause.is_retryable(),
            },
            _ => self.is_network(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind(), ErrorKind::Exhausted { .. })
    }
}

/// 4xx statuses other than request-timeout and too-many-requests.
pub fn is_client_rejection(status: u16) -> bool {
    (400..500).contains(&status) && status != 408 && status != 429
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.inner)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}

#[cfg(feature = "no-wasm")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Error {
        Error::new(ErrorKind::ReqwestError(e))
    }
}

#[cfg(feature = "wasm")]
impl From<gloo_net::Error> for Error {
    fn from(e: gloo_net::Error) -> Error {
        Error::new(ErrorKind::GlooNetError(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::new(ErrorKind::SerdeJsonError(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::new(ErrorKind::StdIoError(e))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[cfg(feature = "no-wasm")]
    #[error("ReqwestError: {0}")]
    ReqwestError(reqwest::Error),
    #[cfg(feature = "wasm")]
    #[error("GlooNetError: {0}")]
    GlooNetError(gloo_net::Error),
    #[error("TransportError: {0}")]
    Transport(String),
    #[error("HttpError: status {status}")]
    Http { status: u16 },
    #[error("DecodeError: {0}")]
    Decode(String),
    #[error("DispatchError: gave up after {attempts} attempt(s), last cause: {last_cause}")]
    Exhausted { attempts: u32, last_cause: Error },
    #[error("PersistenceError: {0}")]
    Persistence(String),
    #[error("InvalidRequest: {0}")]
    InvalidRequest(String),
    #[error("ConfigError: {0}")]
    Config(String),
    /// Host environment is missing something (no window, listener refused)
    #[error("EnvironmentError: {0}")]
    Environment(String),
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(serde_json::Error),
    #[error("StdIoError: {0}")]
    StdIoError(std::io::Error),
}
