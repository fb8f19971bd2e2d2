//! Route advertisements
//!
//! A router advertises its whole table inside a Control packet. The payload
//! is the advertiser's identifier, left-zero-padded to the destination
//! width, immediately followed by the table as a JSON object:
//!
//! ```text
//! 000RB{"RA":{"RA":1,"RB":1},"RB":{"RB":0}}
//! ```

use bellhop_core::{DESTINATION_WIDTH, Destination, NetworkPacket, NodeId};

use crate::error::{RoutingError, RoutingResult};
use crate::table::{RouteMap, RoutingTable};

/// Snapshot of one router's table, tagged with its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAdvert {
    pub advertiser: NodeId,
    pub routes: RouteMap,
}

impl RouteAdvert {
    /// Snapshot a routing table
    pub fn from_table(table: &RoutingTable) -> Self {
        Self {
            advertiser: table.owner().clone(),
            routes: table.routes().clone(),
        }
    }

    /// Encode as a Control payload
    pub fn to_payload(&self) -> RoutingResult<Vec<u8>> {
        let mut payload = self.advertiser.to_padded().into_bytes();
        serde_json::to_writer(&mut payload, &self.routes)?;
        Ok(payload)
    }

    /// Decode a Control payload
    pub fn from_payload(payload: &[u8]) -> RoutingResult<Self> {
        if payload.len() < DESTINATION_WIDTH {
            return Err(RoutingError::MalformedAdvert(format!(
                "payload of {} bytes has no advertiser field",
                payload.len()
            )));
        }

        let (field, body) = payload.split_at(DESTINATION_WIDTH);
        let field = std::str::from_utf8(field)
            .map_err(|_| RoutingError::MalformedAdvert("advertiser field is not UTF-8".into()))?;
        let advertiser = match Destination::from_field(field) {
            Ok(Destination::Node(id)) => id,
            Ok(Destination::Broadcast) => {
                return Err(RoutingError::MalformedAdvert(
                    "advertiser field is empty".into(),
                ));
            }
            Err(e) => return Err(RoutingError::MalformedAdvert(e.to_string())),
        };
        let routes: RouteMap = serde_json::from_slice(body)?;

        Ok(Self { advertiser, routes })
    }

    /// Wrap in a link-local Control packet
    pub fn to_packet(&self) -> RoutingResult<NetworkPacket> {
        Ok(NetworkPacket::control(self.to_payload()?))
    }
}
