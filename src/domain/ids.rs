//! Type-safe identifiers for rooms, quizzes, members, and sessions.
//!
//! [`RoomId`] and [`QuizId`] are newtype wrappers around [`uuid::Uuid`]
//! (v4) minted by this service. [`MemberId`] and [`SessionId`] wrap opaque
//! strings because they are minted by the external identity layer and the
//! transport, not by the gateway.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Session IDs with this prefix were minted from a token-based handshake
/// and represent the same logical connection reconnecting; they are never
/// terminated in favor of a newcomer.
pub const RECONNECT_SESSION_PREFIX: &str = "token-";

/// Unique identifier for a quiz room.
///
/// Wraps a UUID v4. Generated once at room creation time and immutable
/// thereafter. Used as the store key suffix, event discriminator, and
/// WebSocket subscription target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(uuid::Uuid);

impl RoomId {
    /// Creates a new random `RoomId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `RoomId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for RoomId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RoomId> for uuid::Uuid {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

/// Unique identifier for a generated quiz session.
///
/// Minted when quiz generation completes; bound to a room via the
/// `room:{id}:quizId` store key for the lifetime of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(uuid::Uuid);

impl QuizId {
    /// Creates a new random `QuizId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `QuizId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for QuizId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque member identity supplied by the external identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Wraps an identity string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque connection/session identifier minted by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a session id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the session id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for reconnect-style sessions (token-based handshake),
    /// which are exempt from duplicate-login termination.
    #[must_use]
    pub fn is_reconnect_style(&self) -> bool {
        self.0.starts_with(RECONNECT_SESSION_PREFIX)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = RoomId::new();
        let b = RoomId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_uuid_format() {
        let id = QuizId::new();
        let s = format!("{id}");
        assert_eq!(s.len(), 36); // UUID string length
        assert!(s.contains('-'));
    }

    #[test]
    fn serde_round_trip() {
        let id = RoomId::new();
        let json = serde_json::to_string(&id).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        let deserialized: RoomId = serde_json::from_str(&json).ok().unwrap_or_else(|| {
            panic!("deserialization failed");
        });
        assert_eq!(id, deserialized);
    }

    #[test]
    fn member_id_is_transparent_text() {
        let id = MemberId::from("alice@example.com");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"alice@example.com\""));
    }

    #[test]
    fn reconnect_style_detection() {
        assert!(SessionId::from("token-abc123").is_reconnect_style());
        assert!(!SessionId::from("ws-abc123").is_reconnect_style());
    }

    #[test]
    fn hash_works_in_hashmap() {
        use std::collections::HashMap;
        let id = RoomId::new();
        let mut map = HashMap::new();
        map.insert(id, "test");
        assert_eq!(map.get(&id), Some(&"test"));
    }
}
