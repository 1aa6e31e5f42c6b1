//! Basic type definitions for the relay
//!
//! Newtype wrappers around the wire-provided string identifiers:
//! - `UserId`: client-chosen user identifier
//! - `ChannelId`: top-level scope identifier
//! - `GroupId`: broadcast scope identifier inside a channel

use serde::{Deserialize, Serialize};

/// User identifier, supplied by the client on connect (newtype pattern)
///
/// Implements Hash and Eq for use as a registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Channel identifier, the top-level scope key in the server registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

/// Group identifier, unique within its owning channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_id!(UserId);
impl_id!(ChannelId);
impl_id!(GroupId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        let id = UserId::new("u1");
        assert_eq!(id.to_string(), "u1");
        assert_eq!(id.as_str(), "u1");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = ChannelId::new("c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");
        let back: ChannelId = serde_json::from_str("\"c1\"").unwrap();
        assert_eq!(back, id);
    }
}
