//! # Bellhop Core
//!
//! Core types, errors and plumbing shared by every Bellhop network element.
//!
//! The same building blocks serve routers, hosts and the link layer that
//! connects them:
//!
//! - [`NodeId`] / [`Destination`]: fixed-width node addressing
//! - [`NetworkPacket`]: the network-layer packet and its wire codec
//! - [`LinkQueue`]: a bounded FIFO of encoded packets
//! - [`Interface`]: an inbound/outbound queue pair bound to one port
//! - [`Node`]: the step-driven loop every element runs, with [`spawn`] and
//!   [`NodeHandle`] for running it on a tokio task

pub mod error;
pub mod identity;
pub mod interface;
pub mod lifecycle;
pub mod packet;
pub mod queue;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use interface::*;
pub use lifecycle::*;
pub use packet::*;
pub use queue::*;
