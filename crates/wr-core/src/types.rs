//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the messaging session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session; a new attempt is pending
    Disconnected,
    /// A session attempt is in progress
    Connecting,
    /// The transport reported the session open
    Open,
    /// Supervision is suspended (circuit breaker open) or stopped
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// Well-known close status codes reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    LoggedOut,
    Forbidden,
    ConnectionLost,
    MultideviceMismatch,
    ConnectionClosed,
    ConnectionReplaced,
    BadSession,
    UnavailableService,
    RestartRequired,
}

impl DisconnectReason {
    /// Status code sent when the device was logged out
    pub const LOGGED_OUT: u16 = 401;

    /// Map a status code to a known reason
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            401 => Some(Self::LoggedOut),
            403 => Some(Self::Forbidden),
            408 => Some(Self::ConnectionLost),
            411 => Some(Self::MultideviceMismatch),
            428 => Some(Self::ConnectionClosed),
            440 => Some(Self::ConnectionReplaced),
            500 => Some(Self::BadSession),
            503 => Some(Self::UnavailableService),
            515 => Some(Self::RestartRequired),
            _ => None,
        }
    }

    /// The status code for this reason
    pub fn code(&self) -> u16 {
        match self {
            Self::LoggedOut => 401,
            Self::Forbidden => 403,
            Self::ConnectionLost => 408,
            Self::MultideviceMismatch => 411,
            Self::ConnectionClosed => 428,
            Self::ConnectionReplaced => 440,
            Self::BadSession => 500,
            Self::UnavailableService => 503,
            Self::RestartRequired => 515,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoggedOut => "logged out",
            Self::Forbidden => "forbidden",
            Self::ConnectionLost => "connection lost",
            Self::MultideviceMismatch => "multi-device mismatch",
            Self::ConnectionClosed => "connection closed",
            Self::ConnectionReplaced => "connection replaced",
            Self::BadSession => "bad session",
            Self::UnavailableService => "service unavailable",
            Self::RestartRequired => "restart required",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Why a transport session closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseReason {
    /// Status code of the closing error, if any
    pub status_code: Option<u16>,
    /// Explicit logout signal from the transport
    pub logged_out: bool,
}

impl CloseReason {
    /// A close with a status code
    pub fn with_code(code: u16) -> Self {
        Self {
            status_code: Some(code),
            logged_out: false,
        }
    }

    /// Whether this close invalidates the stored credentials
    pub fn is_logout(&self) -> bool {
        self.logged_out || self.status_code == Some(DisconnectReason::LOGGED_OUT)
    }

    /// Known reason for the status code
    pub fn reason(&self) -> Option<DisconnectReason> {
        self.status_code.and_then(DisconnectReason::from_code)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.reason(), self.status_code) {
            (Some(reason), _) => write!(f, "{}", reason),
            (None, Some(code)) => write!(f, "status {}", code),
            (None, None) if self.logged_out => write!(f, "logged out"),
            (None, None) => write!(f, "no status"),
        }
    }
}

/// Opaque session key material
///
/// Only the `registered` flag is interpreted; everything else belongs to
/// the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(serde_json::Value);

impl Credentials {
    /// Wrap a credential blob
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Whether the account finished linking
    pub fn is_registered(&self) -> bool {
        self.0
            .get("registered")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Borrow the raw blob
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Take the raw blob
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_codes() {
        assert!(CloseReason::with_code(401).is_logout());
        assert!(CloseReason {
            status_code: Some(500),
            logged_out: true
        }
        .is_logout());

        for code in [403, 408, 428, 440, 500, 503, 515] {
            assert!(!CloseReason::with_code(code).is_logout(), "code {}", code);
        }
        assert!(!CloseReason::default().is_logout());
    }

    #[test]
    fn test_disconnect_reason_roundtrip() {
        for code in [401, 403, 408, 411, 428, 440, 500, 503, 515] {
            assert_eq!(DisconnectReason::from_code(code).unwrap().code(), code);
        }
        assert!(DisconnectReason::from_code(999).is_none());
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::with_code(401).to_string(), "logged out (401)");
        assert_eq!(CloseReason::with_code(999).to_string(), "status 999");
        assert_eq!(CloseReason::default().to_string(), "no status");
    }

    #[test]
    fn test_credentials_registered() {
        let creds = Credentials::new(serde_json::json!({ "registered": true, "me": {} }));
        assert!(creds.is_registered());
        assert!(!Credentials::new(serde_json::json!({})).is_registered());
        assert!(!Credentials::new(serde_json::json!({ "registered": "yes" })).is_registered());
    }
}
