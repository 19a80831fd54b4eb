//! Peer-to-peer netplay session core.
//!
//! One participant (the host) runs the only copy of a game and streams
//! compressed frame diffs to up to three guests, who send their input
//! back over the same channel. This crate is the transport-agnostic
//! protocol core: the frame codec, the typed message envelope, the
//! connection registry, and the host/client role state machines.
//!
//! Connectivity itself (signaling relay, NAT traversal, the actual
//! data channels) lives behind the [`transport::PeerTransport`] seam;
//! [`memory::MemoryHub`] provides an in-process implementation for
//! tests and demos.

pub mod client;
pub mod error;
pub mod frame;
pub mod host;
pub mod memory;
pub mod message;
pub mod registry;
pub mod signal;
pub mod slots;
pub mod transport;

pub use client::{ClientConfig, ClientPhase, ClientRole};
pub use error::NetplayError;
pub use frame::{composite, decode_frame, encode_frame_diff, DecodedFrame, EncodedFrame, FrameRegion};
pub use host::{FrameCadence, HostConfig, HostRole};
pub use memory::MemoryHub;
pub use message::{ChannelMessage, MessageKind, MessageMeta, ParticipantId, WirePayload};
pub use registry::ConnectionRegistry;
pub use signal::{Signal, SignalKind};
pub use slots::{PlayerSlot, RoleBinding, SlotRequest, SlotSnapshot, SlotTable};
pub use transport::{LinkChannel, LocalEvent, PeerTransport, SessionEvent};
