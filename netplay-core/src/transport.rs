//! Seams between the protocol core and the outside world.
//!
//! The core never owns a socket. It drives a [`PeerTransport`] — the
//! out-of-scope signaling/NAT collaborator — and consumes a stream of
//! [`SessionEvent`]s delivered into a single-consumer queue. One event
//! is processed at a time, so role state needs no locking and a close
//! event can never re-enter the handler that caused it.

use bytes::Bytes;

use crate::message::{ChannelMessage, ParticipantId, WirePayload};
use crate::signal::Signal;

// ── LinkChannel ──────────────────────────────────────────────────

/// The sending half of one established message channel.
///
/// `send` is deliberately infallible at the call site: sends race with
/// asynchronous closure, and a payload sent into a closing channel is
/// simply dropped by the implementation. `close` tears down the channel
/// *and* its underlying transport.
pub trait LinkChannel: Send {
    fn send(&self, payload: WirePayload);
    fn close(&self);
}

// ── PeerTransport ────────────────────────────────────────────────

/// The external connection/signaling collaborator.
///
/// `generation` tags every link a role opens; inbound channel events
/// carry it back so stale events for a replaced link can be dropped.
pub trait PeerTransport: Send + Sync {
    /// Client side: begin establishing a link to `peer`. Returns the
    /// channel handle and the session offer to relay.
    fn connect(&self, peer: ParticipantId, generation: u64) -> (Box<dyn LinkChannel>, Signal);

    /// Host side: accept a remote offer from `peer`. Returns the
    /// channel handle and the answer to relay back.
    fn accept(
        &self,
        peer: ParticipantId,
        generation: u64,
        offer: &Signal,
    ) -> (Box<dyn LinkChannel>, Signal);

    /// Relay a signaling payload to `to` over the out-of-band channel.
    fn send_signal(&self, to: ParticipantId, signal: Signal);

    /// Apply a non-offer signal (answer, ICE candidate) to the pending
    /// link with `peer`.
    fn apply_signal(&self, peer: ParticipantId, signal: &Signal);
}

// ── SessionEvent ─────────────────────────────────────────────────

/// Everything a role reacts to, delivered through its event queue.
#[derive(Debug)]
pub enum SessionEvent {
    /// A signaling payload relayed from another participant.
    Signal {
        from: ParticipantId,
        signal: Signal,
    },
    /// A link's channel became ready.
    ChannelOpen {
        participant: ParticipantId,
        generation: u64,
    },
    /// A link's channel closed (failure, leave, or replacement).
    ChannelClosed {
        participant: ParticipantId,
        generation: u64,
    },
    /// Inbound traffic on an open channel.
    Message {
        participant: ParticipantId,
        generation: u64,
        payload: WirePayload,
    },
    /// A freshly rendered RGBA raster from the emulation loop
    /// (host only).
    Frame { pixels: Bytes, frame_number: u64 },
    /// Stop the role's event loop.
    Shutdown,
}

// ── LocalEvent ───────────────────────────────────────────────────

/// The sole public output of a role, consumed by UI/rendering layers.
#[derive(Debug, Clone)]
pub enum LocalEvent {
    /// A protocol message addressed to the local participant.
    Message(ChannelMessage),
    /// A full composited RGBA raster (client side).
    Frame(Bytes),
}
