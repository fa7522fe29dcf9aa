use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Machine-readable failure category shared by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller parameters were missing or malformed; nothing was sent.
    Validation,
    /// No response was obtained (connection, DNS, TLS, timeout).
    Transport,
    Unauthorized,
    Forbidden,
    NotFound,
    NotAcceptable,
    UnprocessableParams,
    ServerError,
    Unknown,
    /// The server answered with success but the body did not have the expected shape.
    MalformedResponse,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NotAcceptable => "NotAcceptable",
            ErrorKind::UnprocessableParams => "UnprocessableParams",
            ErrorKind::ServerError => "ServerError",
            ErrorKind::Unknown => "Unknown",
            ErrorKind::MalformedResponse => "MalformedResponse",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) const HINT_UNAUTHORIZED: &str = "credential invalid or expired";
pub(crate) const HINT_FORBIDDEN: &str = "credential invalid, expired, or quota exceeded";
pub(crate) const HINT_NOT_FOUND: &str = "requested data not yet available for the date range";
pub(crate) const HINT_NOT_ACCEPTABLE: &str = "date range too large; request a shorter interval";
pub(crate) const HINT_UNPROCESSABLE: &str = "parameter type or formatting error";
pub(crate) const HINT_SERVER_ERROR: &str = "upstream server error";
pub(crate) const HINT_UNKNOWN: &str = "unexpected HTTP status";
pub(crate) const HINT_MALFORMED: &str = "response did not match expected schema";

/// A classified failure returned instead of rows or a quota record.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// `None` for failures that happened after a successful status.
    pub http_status: Option<u16>,
    /// Verbatim server text, kept even when a friendlier hint is available.
    pub server_message: Option<String>,
    pub hint: String,
}

impl ErrorRecord {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::MalformedResponse,
            http_status: None,
            server_message: Some(detail.into()),
            hint: HINT_MALFORMED.to_string(),
        }
    }

    pub(crate) fn malformed_with_status(status: u16, detail: impl Into<String>) -> Self {
        Self {
            http_status: Some(status),
            ..Self::malformed(detail)
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(f, "{} (HTTP {}): {}", self.kind, status, self.hint)?,
            None => write!(f, "{}: {}", self.kind, self.hint)?,
        }
        if let Some(msg) = self.server_message.as_deref().filter(|m| !m.is_empty()) {
            write!(f, "\nServer message: {}", msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorRecord {}

/// Problems with caller parameters, detected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required parameter(s): {}", .0.join(", "))]
    MissingParams(Vec<String>),

    #[error("unknown parameter `{0}` for this operation")]
    UnknownParam(String),

    #[error("invalid value for `{param}`: {reason}")]
    InvalidValue { param: String, reason: String },

    #[error("invalid geometry: {0}")]
    Geometry(String),
}

impl ValidationError {
    pub(crate) fn invalid(param: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

/// No response was obtained from the server. Never retried by the crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        // reqwest includes the URL but never request headers, so the credential stays out.
        TransportError::new(kind, err.to_string())
    }
}

/// Error type for every public operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameters: {0}")]
    Validation(#[from] ValidationError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Api(#[from] ErrorRecord),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Api(record) => record.kind,
        }
    }

    /// The classified record, when the server answered.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            Error::Api(record) => Some(record),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Default, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Pulls the server's own explanation out of an error body.
pub(crate) fn server_message(body: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(text) {
        let detail = parsed.detail.and_then(|d| match d {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        let found = detail.or(parsed.message).or(parsed.error).or(parsed.title);
        if found.is_some() {
            return found;
        }
    }

    Some(text.to_string())
}

/// Maps a non-success status to its kind and hint.
///
/// `server_error_hint` lets an operation supply a more specific explanation for 500s.
pub(crate) fn classify(status: u16, body: &[u8], server_error_hint: Option<&str>) -> ErrorRecord {
    let (kind, hint) = match status {
        401 => (ErrorKind::Unauthorized, HINT_UNAUTHORIZED),
        403 => (ErrorKind::Forbidden, HINT_FORBIDDEN),
        404 => (ErrorKind::NotFound, HINT_NOT_FOUND),
        406 => (ErrorKind::NotAcceptable, HINT_NOT_ACCEPTABLE),
        422 => (ErrorKind::UnprocessableParams, HINT_UNPROCESSABLE),
        500 => (
            ErrorKind::ServerError,
            server_error_hint.unwrap_or(HINT_SERVER_ERROR),
        ),
        _ => (ErrorKind::Unknown, HINT_UNKNOWN),
    };

    ErrorRecord {
        kind,
        http_status: Some(status),
        server_message: server_message(body),
        hint: hint.to_string(),
    }
}
