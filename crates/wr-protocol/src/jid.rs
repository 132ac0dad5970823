//! Destination identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server suffix for individual user addresses
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Legacy user server, equivalent to [`USER_SERVER`]
const LEGACY_USER_SERVER: &str = "c.us";

/// A normalized address messages are sent to (`<digits>@s.whatsapp.net`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Wrap a raw identifier as-is
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a user address from free-form phone input.
    ///
    /// Every non-digit character is stripped. Returns `None` when no digits remain.
    pub fn from_phone(raw: &str) -> Option<Self> {
        let digits = digits_only(raw);
        if digits.is_empty() {
            return None;
        }
        Some(Self(format!("{}@{}", digits, USER_SERVER)))
    }

    /// User part of the address, without device suffix or server
    ///
    /// `15551234567:12@s.whatsapp.net` becomes `15551234567`.
    pub fn user(&self) -> &str {
        let user = self.0.split('@').next().unwrap_or_default();
        user.split(':').next().unwrap_or_default()
    }

    /// Server part, empty when the identifier has none
    pub fn server(&self) -> &str {
        self.0.split_once('@').map(|(_, server)| server).unwrap_or_default()
    }

    /// The same address without a device suffix.
    ///
    /// The server is kept, so group and broadcast addresses stay what they
    /// are; only the legacy `c.us` server is mapped to [`USER_SERVER`].
    pub fn normalized(&self) -> Self {
        match self.server() {
            "" => self.clone(),
            LEGACY_USER_SERVER => Self(format!("{}@{}", self.user(), USER_SERVER)),
            server => Self(format!("{}@{}", self.user(), server)),
        }
    }

    /// Get the raw identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Jid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Jid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Strip everything that is not an ASCII digit
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
