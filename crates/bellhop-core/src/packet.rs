//! Network-layer packet and its wire codec
//!
//! Layout on the wire:
//!
//! ```text
//! [destination: DESTINATION_WIDTH chars, left-zero-padded][kind: '1' | '2'][payload ...]
//! ```
//!
//! `'1'` marks a data packet, `'2'` a control (routing) packet. The payload
//! runs to the end of the byte string.

use std::fmt::{self, Display};

use crate::error::{CodecError, IdentityError};
use crate::identity::{DESTINATION_WIDTH, Destination, NodeId};

/// Width of the protocol tag field
pub const KIND_WIDTH: usize = 1;

/// Total header length preceding the payload
pub const HEADER_WIDTH: usize = DESTINATION_WIDTH + KIND_WIDTH;

/// Upper layer protocol carried by a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PacketKind {
    /// Application data
    Data,
    /// Routing advertisement
    Control,
}

impl PacketKind {
    /// Wire tag for this kind
    pub fn tag(self) -> u8 {
        match self {
            Self::Data => b'1',
            Self::Control => b'2',
        }
    }

    /// Parse a wire tag
    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            b'1' => Ok(Self::Data),
            b'2' => Ok(Self::Control),
            other => Err(CodecError::UnknownProtocolTag(other as char)),
        }
    }
}

impl Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Control => f.write_str("control"),
        }
    }
}

/// A network-layer packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPacket {
    /// Final destination
    pub destination: Destination,
    /// Upper layer protocol
    pub kind: PacketKind,
    /// Opaque payload
    pub payload: Vec<u8>,
}

impl NetworkPacket {
    /// Create a packet
    pub fn new(destination: Destination, kind: PacketKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            destination,
            kind,
            payload: payload.into(),
        }
    }

    /// Create a data packet addressed to a node
    pub fn data(destination: NodeId, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Destination::Node(destination), PacketKind::Data, payload)
    }

    /// Create a link-local control packet
    pub fn control(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Destination::Broadcast, PacketKind::Control, payload)
    }

    /// Encode for transmission over a link
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_WIDTH + self.payload.len());
        bytes.extend_from_slice(self.destination.to_field().as_bytes());
        bytes.push(self.kind.tag());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decode a packet received from a link
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_WIDTH {
            return Err(CodecError::Truncated {
                expected: HEADER_WIDTH,
                actual: bytes.len(),
            });
        }

        let field = std::str::from_utf8(&bytes[..DESTINATION_WIDTH]).map_err(|_| {
            IdentityError::InvalidCharacter(
                String::from_utf8_lossy(&bytes[..DESTINATION_WIDTH]).into_owned(),
            )
        })?;
        let destination = Destination::from_field(field)?;
        let kind = PacketKind::from_tag(bytes[DESTINATION_WIDTH])?;

        Ok(Self {
            destination,
            kind,
            payload: bytes[HEADER_WIDTH..].to_vec(),
        })
    }
}

impl Display for NetworkPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.destination.to_field(),
            self.kind.tag() as char,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    #[test]
    fn test_data_layout() {
        let packet = NetworkPacket::data(node("H2"), b"hello".to_vec());
        assert_eq!(packet.to_bytes(), b"000H21hello");
    }

    #[test]
    fn test_control_layout() {
        let packet = NetworkPacket::control(b"RA{}".to_vec());
        assert_eq!(packet.to_bytes(), b"000002RA{}");
    }

    #[test]
    fn test_roundtrip_both_kinds() {
        let packets = [
            NetworkPacket::data(node("1"), b"payload with 0 zeros 00".to_vec()),
            NetworkPacket::data(node("R9990"), Vec::new()),
            NetworkPacket::control(b"000RA{\"RA\":{\"RA\":0}}".to_vec()),
        ];
        for packet in packets {
            let decoded = NetworkPacket::from_bytes(&packet.to_bytes()).unwrap();
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(
            NetworkPacket::from_bytes(b"000H23hello"),
            Err(CodecError::UnknownProtocolTag('3'))
        );
        assert_eq!(
            NetworkPacket::from_bytes(b"000H2xhello"),
            Err(CodecError::UnknownProtocolTag('x'))
        );
    }

    #[test]
    fn test_truncated_rejected() {
        assert_eq!(
            NetworkPacket::from_bytes(b"000H"),
            Err(CodecError::Truncated {
                expected: HEADER_WIDTH,
                actual: 4
            })
        );
    }

    #[test]
    fn test_bad_destination_rejected() {
        assert!(matches!(
            NetworkPacket::from_bytes(b"00-H21x"),
            Err(CodecError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_display_matches_wire() {
        let packet = NetworkPacket::data(node("H1"), b"hi".to_vec());
        assert_eq!(packet.to_string(), "000H11hi");
    }
}
