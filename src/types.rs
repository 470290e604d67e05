//! Session identifiers
//!
//! A connection's identity is user-chosen and changes on rename, so logs
//! follow a connection by `SessionId` instead.

use std::fmt;

use uuid::Uuid;

/// Hex digits shown when a session ID is printed
const TAG_LEN: usize = 8;

/// Stable per-connection identifier, assigned before registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints a short tag such as `#9f3c2a1b`, enough to tell sessions apart in logs
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Uuid::encode_buffer();
        let hex = self.0.simple().encode_lower(&mut buf);
        write!(f, "#{}", &hex[..TAG_LEN])
    }
}
