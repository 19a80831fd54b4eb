//! In-process transport for tests and demos.
//!
//! A [`MemoryHub`] stands in for the real signaling service and data
//! channels: every participant registers an endpoint, signals are routed
//! between endpoints as [`SessionEvent::Signal`]s, and a link's two ends
//! are wired directly together. The establishment dance is deliberately
//! the real one (offer, answer, apply, open on both sides) so the roles
//! exercise the same code paths they would over a real network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::message::{ParticipantId, WirePayload};
use crate::signal::{Signal, SignalKind};
use crate::transport::{LinkChannel, PeerTransport, SessionEvent};

/// One directed end of a link, keyed by `(owner, peer)`.
struct EndState {
    generation: u64,
}

#[derive(Default)]
struct HubInner {
    /// Event queue of each registered participant.
    endpoints: HashMap<ParticipantId, mpsc::UnboundedSender<SessionEvent>>,
    ends: HashMap<(ParticipantId, ParticipantId), EndState>,
}

impl HubInner {
    fn push(&self, to: ParticipantId, event: SessionEvent) {
        if let Some(tx) = self.endpoints.get(&to) {
            // The participant may have shut down already.
            let _ = tx.send(event);
        }
    }

    /// Drop one directed end, telling its owner when asked.
    fn drop_end(&mut self, owner: ParticipantId, peer: ParticipantId, notify: bool) {
        if let Some(end) = self.ends.remove(&(owner, peer)) {
            if notify {
                self.push(
                    owner,
                    SessionEvent::ChannelClosed {
                        participant: peer,
                        generation: end.generation,
                    },
                );
            }
        }
    }
}

/// Shared in-process "network". Cheap to clone.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant and get the transport its role will use.
    pub fn endpoint(
        &self,
        owner: ParticipantId,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Arc<MemoryEndpoint> {
        self.lock().endpoints.insert(owner, events);
        Arc::new(MemoryEndpoint {
            inner: Arc::clone(&self.inner),
            owner,
        })
    }

    /// Simulate a network drop of the link between two participants.
    /// Both sides observe `ChannelClosed`, like a real transport error.
    pub fn sever(&self, a: ParticipantId, b: ParticipantId) {
        let mut inner = self.lock();
        inner.drop_end(a, b, true);
        inner.drop_end(b, a, true);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A participant's view of the hub; implements [`PeerTransport`].
pub struct MemoryEndpoint {
    inner: Arc<Mutex<HubInner>>,
    owner: ParticipantId,
}

impl MemoryEndpoint {
    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn channel(&self, peer: ParticipantId) -> Box<dyn LinkChannel> {
        Box::new(MemoryChannel {
            inner: Arc::clone(&self.inner),
            owner: self.owner,
            peer,
        })
    }
}

impl PeerTransport for MemoryEndpoint {
    fn connect(&self, peer: ParticipantId, generation: u64) -> (Box<dyn LinkChannel>, Signal) {
        self.lock()
            .ends
            .insert((self.owner, peer), EndState { generation });
        (self.channel(peer), Signal::offer(format!("mem:{}", self.owner)))
    }

    fn accept(
        &self,
        peer: ParticipantId,
        generation: u64,
        _offer: &Signal,
    ) -> (Box<dyn LinkChannel>, Signal) {
        self.lock()
            .ends
            .insert((self.owner, peer), EndState { generation });
        (self.channel(peer), Signal::answer(format!("mem:{}", self.owner)))
    }

    fn send_signal(&self, to: ParticipantId, signal: Signal) {
        self.lock().push(
            to,
            SessionEvent::Signal {
                from: self.owner,
                signal,
            },
        );
    }

    fn apply_signal(&self, peer: ParticipantId, signal: &Signal) {
        // Applying the answer is the last step of establishment; the
        // hub then reports both ends open.
        if signal.kind != SignalKind::Answer {
            return;
        }
        let inner = self.lock();
        let Some(own) = inner.ends.get(&(self.owner, peer)) else {
            return;
        };
        let Some(theirs) = inner.ends.get(&(peer, self.owner)) else {
            return;
        };
        inner.push(
            self.owner,
            SessionEvent::ChannelOpen {
                participant: peer,
                generation: own.generation,
            },
        );
        inner.push(
            peer,
            SessionEvent::ChannelOpen {
                participant: self.owner,
                generation: theirs.generation,
            },
        );
    }
}

/// One end of an open link. Sends deliver to the peer's event queue,
/// tagged with the generation the *receiver* assigned to its end.
struct MemoryChannel {
    inner: Arc<Mutex<HubInner>>,
    owner: ParticipantId,
    peer: ParticipantId,
}

impl LinkChannel for MemoryChannel {
    fn send(&self, payload: WirePayload) {
        let inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Both ends must still exist, otherwise the link is down and
        // the send is swallowed like any closed channel's.
        if !inner.ends.contains_key(&(self.owner, self.peer)) {
            return;
        }
        let Some(end) = inner.ends.get(&(self.peer, self.owner)) else {
            return;
        };
        inner.push(
            self.peer,
            SessionEvent::Message {
                participant: self.owner,
                generation: end.generation,
                payload,
            },
        );
    }

    fn close(&self) {
        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // The closer already forgot its end; only the peer is told.
        inner.drop_end(self.owner, self.peer, false);
        inner.drop_end(self.peer, self.owner, true);
    }
}

// ── Tests ────────────────────────────────────────────────────────
