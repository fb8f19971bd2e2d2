//! Node identifiers and packet destinations
//!
//! A [`NodeId`] names a host or a router. Identifiers travel inside a
//! fixed-width, left-zero-padded field on the wire, so they are restricted
//! to short ASCII alphanumeric strings that never start with `'0'`. That
//! restriction makes padding reversible: stripping leading zeros always
//! recovers the original identifier, and an all-zero field is free to mean
//! [`Destination::Broadcast`].

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Width of the destination field on the wire
pub const DESTINATION_WIDTH: usize = 5;

/// Identifier of a host or router
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a node identifier, validating it fits the wire format
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentityError::Empty);
        }
        if id.len() > DESTINATION_WIDTH {
            return Err(IdentityError::TooLong {
                id,
                max: DESTINATION_WIDTH,
            });
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IdentityError::InvalidCharacter(id));
        }
        if id.starts_with('0') {
            return Err(IdentityError::LeadingZero(id));
        }
        Ok(Self(id))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render the identifier left-padded with `'0'` to `DESTINATION_WIDTH`
    pub fn to_padded(&self) -> String {
        format!("{:0>width$}", self.0, width = DESTINATION_WIDTH)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodeId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = IdentityError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Where a packet is headed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Link-local broadcast, encoded as an all-zero field
    Broadcast,
    /// A specific host or router
    Node(NodeId),
}

impl Destination {
    /// Encode into the fixed-width wire field
    pub fn to_field(&self) -> String {
        match self {
            Self::Broadcast => "0".repeat(DESTINATION_WIDTH),
            Self::Node(id) => id.to_padded(),
        }
    }

    /// Decode from a fixed-width wire field
    ///
    /// Leading zeros are stripped; an empty remainder is `Broadcast`.
    pub fn from_field(field: &str) -> Result<Self, IdentityError> {
        let stripped = field.trim_start_matches('0');
        if stripped.is_empty() {
            Ok(Self::Broadcast)
        } else {
            NodeId::new(stripped).map(Self::Node)
        }
    }

    /// The node this destination names, if any
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::Broadcast => None,
            Self::Node(id) => Some(id),
        }
    }

    /// Check if this is the broadcast destination
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast)
    }
}

impl From<NodeId> for Destination {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast => f.write_str("*"),
            Self::Node(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_validation() {
        assert!(NodeId::new("RA").is_ok());
        assert!(NodeId::new("H1").is_ok());
        assert!(NodeId::new("12345").is_ok());
        assert_eq!(NodeId::new(""), Err(IdentityError::Empty));
        assert!(matches!(
            NodeId::new("ROUTER"),
            Err(IdentityError::TooLong { max: DESTINATION_WIDTH, .. })
        ));
        assert!(matches!(
            NodeId::new("R-A"),
            Err(IdentityError::InvalidCharacter(_))
        ));
        assert!(matches!(
            NodeId::new("0A"),
            Err(IdentityError::LeadingZero(_))
        ));
    }

    #[test]
    fn test_padding_is_reversible() {
        for raw in ["1", "H10", "RA", "R0000", "99999"] {
            let id = NodeId::new(raw).unwrap();
            let field = id.to_padded();
            assert_eq!(field.len(), DESTINATION_WIDTH);
            assert_eq!(Destination::from_field(&field).unwrap(), Destination::Node(id));
        }
    }

    #[test]
    fn test_trailing_zeros_survive() {
        // "H10" must not lose its trailing zero when padding is stripped
        let dest = Destination::from_field("00H10").unwrap();
        assert_eq!(dest.node().unwrap().as_str(), "H10");
    }

    #[test]
    fn test_all_zero_field_is_broadcast() {
        assert_eq!(Destination::from_field("00000").unwrap(), Destination::Broadcast);
        assert_eq!(Destination::Broadcast.to_field(), "00000");
    }

    #[test]
    fn test_serde_as_string() {
        let id = NodeId::new("RB").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"RB\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<NodeId>("\"0RB\"").is_err());
    }
}
