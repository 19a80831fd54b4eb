//! Ownership of active peer links.
//!
//! The registry is the sole mutator of link/channel lifecycle: roles
//! never close a channel directly. Each link carries a generation
//! number; channel events tagged with a stale generation belong to a
//! replaced link and are ignored, which is what makes teardown safe to
//! run from inside a close notification.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::message::{ParticipantId, WirePayload};
use crate::signal::Signal;
use crate::transport::{LinkChannel, PeerTransport};

// ── Link ─────────────────────────────────────────────────────────

/// Establishment state of one link. A closed link is simply absent
/// from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Session descriptions/candidates still in flight.
    Connecting,
    /// The message channel reported ready.
    Open,
}

/// One direct connection between the local role and a peer.
pub struct Link {
    generation: u64,
    state: LinkState,
    channel: Box<dyn LinkChannel>,
    /// Set once the peer's first ping arrives; gates frame sending.
    client_has_pinged: bool,
}

impl Link {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == LinkState::Open
    }

    pub fn client_has_pinged(&self) -> bool {
        self.client_has_pinged
    }

    pub fn send(&self, payload: WirePayload) {
        self.channel.send(payload);
    }
}

// ── ConnectionRegistry ───────────────────────────────────────────

/// The set of active links, at most one per participant.
pub struct ConnectionRegistry {
    transport: Arc<dyn PeerTransport>,
    links: HashMap<ParticipantId, Link>,
    next_generation: u64,
}

impl ConnectionRegistry {
    pub fn new(transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            transport,
            links: HashMap::new(),
            next_generation: 0,
        }
    }

    fn insert(&mut self, peer: ParticipantId, channel: Box<dyn LinkChannel>) -> u64 {
        let generation = self.next_generation;
        self.links.insert(
            peer,
            Link {
                generation,
                state: LinkState::Connecting,
                channel,
                client_has_pinged: false,
            },
        );
        generation
    }

    /// Open an outbound link to `peer` (client side). Any prior link to
    /// the same peer is torn down first — this replacement is also the
    /// cancellation mechanism for a superseded pending offer.
    pub fn connect(&mut self, peer: ParticipantId) -> (u64, Signal) {
        self.close(peer);
        self.next_generation += 1;
        let (channel, offer) = self.transport.connect(peer, self.next_generation);
        (self.insert(peer, channel), offer)
    }

    /// Accept a remote offer from `peer` (host side), replacing any
    /// prior link.
    pub fn accept(&mut self, peer: ParticipantId, offer: &Signal) -> (u64, Signal) {
        self.close(peer);
        self.next_generation += 1;
        let (channel, answer) = self.transport.accept(peer, self.next_generation, offer);
        (self.insert(peer, channel), answer)
    }

    /// Tear down the link to `peer`. Idempotent. The link is removed
    /// *before* its channel is closed, so the closure notification that
    /// follows finds nothing to act on.
    pub fn close(&mut self, peer: ParticipantId) -> bool {
        match self.links.remove(&peer) {
            Some(link) => {
                debug!(peer, generation = link.generation, "closing link");
                link.channel.close();
                true
            }
            None => false,
        }
    }

    /// Tear down every link.
    pub fn close_all(&mut self) {
        let peers: Vec<_> = self.links.keys().copied().collect();
        for peer in peers {
            self.close(peer);
        }
    }

    /// Mark the link's channel ready. Returns `false` for unknown peers
    /// or a stale generation.
    pub fn mark_open(&mut self, peer: ParticipantId, generation: u64) -> bool {
        match self.links.get_mut(&peer) {
            Some(link) if link.generation == generation => {
                link.state = LinkState::Open;
                true
            }
            _ => false,
        }
    }

    /// Record that `peer` has pinged. Returns `true` only on the first
    /// ping of the link's lifetime.
    pub fn mark_pinged(&mut self, peer: ParticipantId) -> bool {
        match self.links.get_mut(&peer) {
            Some(link) if !link.client_has_pinged => {
                link.client_has_pinged = true;
                true
            }
            _ => false,
        }
    }

    /// Whether an event tagged `generation` belongs to the current link
    /// for `peer`.
    pub fn matches(&self, peer: ParticipantId, generation: u64) -> bool {
        self.links
            .get(&peer)
            .is_some_and(|link| link.generation == generation)
    }

    pub fn link(&self, peer: ParticipantId) -> Option<&Link> {
        self.links.get(&peer)
    }

    /// The channel for `peer`, if its link exists.
    pub fn channel_for(&self, peer: ParticipantId) -> Option<&dyn LinkChannel> {
        self.links.get(&peer).map(|link| &*link.channel)
    }

    /// Visit every link whose channel is open.
    pub fn for_each_open_channel(&self, mut f: impl FnMut(ParticipantId, &Link)) {
        for (&peer, link) in &self.links {
            if link.is_open() {
                f(peer, link);
            }
        }
    }

    /// Number of open channels.
    pub fn open_count(&self) -> usize {
        self.links.values().filter(|l| l.is_open()).count()
    }
}

// ── Tests ────────────────────────────────────────────────────────
