//! The authoritative host role.
//!
//! The host owns the only running copy of the game. It accepts offers
//! from clients, hands out player slots, relays chat, re-emits client
//! input tagged with the sender's slot, and broadcasts compressed frame
//! diffs to every channel that has proven itself ready by pinging.
//!
//! All state lives behind a single-consumer event queue; see
//! [`crate::transport`].

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::NetplayError;
use crate::frame::encode_frame_diff;
use crate::message::{ChannelMessage, MessageMeta, ParticipantId, WirePayload};
use crate::registry::ConnectionRegistry;
use crate::signal::{Signal, SignalKind};
use crate::slots::{PlayerSlot, RoleBinding, SlotTable};
use crate::transport::{LocalEvent, PeerTransport, SessionEvent};

// ── Configuration ────────────────────────────────────────────────

/// How often rendered frames are actually broadcast.
///
/// This is a bandwidth knob, not a correctness mechanism: the channel
/// class used for frames may reorder regardless of cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameCadence {
    /// Broadcast every rendered frame.
    #[default]
    EveryFrame,
    /// Broadcast every second frame, halving bandwidth for latency.
    EverySecondFrame,
}

/// Host role configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Raster width in pixels (frame diffs are scanline-based).
    pub width: u32,
    pub cadence: FrameCadence,
}

// ── HostRole ─────────────────────────────────────────────────────

/// Per-session host state: registry, slot table, retained frame.
///
/// Construct one per game session and drop it with the session; there
/// is no process-wide connection state.
pub struct HostRole {
    identity: RoleBinding,
    transport: Arc<dyn PeerTransport>,
    registry: ConnectionRegistry,
    slots: SlotTable,
    events: mpsc::UnboundedSender<LocalEvent>,
    config: HostConfig,
    /// The raster most recently broadcast; diffs are computed against it.
    prev_frame: Vec<u8>,
    /// Forces the next broadcast to carry the whole raster (set when a
    /// channel first becomes ping-ready, so newcomers get a complete
    /// image to composite onto).
    whole_frame_next: bool,
}

impl HostRole {
    /// Create the role and the local event stream its UI consumes.
    pub fn new(
        identity: RoleBinding,
        transport: Arc<dyn PeerTransport>,
        config: HostConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LocalEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let role = Self {
            registry: ConnectionRegistry::new(Arc::clone(&transport)),
            slots: SlotTable::with_host(identity.clone()),
            identity,
            transport,
            events,
            config,
            prev_frame: Vec::new(),
            whole_frame_next: false,
        };
        (role, rx)
    }

    /// Announce the initial slot table on the local event stream.
    pub fn start(&mut self) {
        info!(host = self.identity.participant_id, "host role started");
        self.emit(LocalEvent::Message(self.role_answer()));
    }

    /// Drive the role from its event queue until `Shutdown`.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
            self.handle_event(event);
        }
        self.shutdown();
    }

    /// Process one event. Never panics and never lets one link's
    /// failure disturb another's bookkeeping.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Signal { from, signal } => self.on_signal(from, signal),
            SessionEvent::ChannelOpen {
                participant,
                generation,
            } => {
                if self.registry.mark_open(participant, generation) {
                    debug!(participant, "channel open");
                }
            }
            SessionEvent::ChannelClosed {
                participant,
                generation,
            } => self.on_channel_closed(participant, generation),
            SessionEvent::Message {
                participant,
                generation,
                payload,
            } => self.on_payload(participant, generation, payload),
            SessionEvent::Frame {
                pixels,
                frame_number,
            } => self.on_frame(&pixels, frame_number),
            SessionEvent::Shutdown => self.shutdown(),
        }
    }

    /// The emulation loop's "is anyone watching" predicate.
    pub fn needs_frame(&self) -> bool {
        self.registry.open_count() > 0
    }

    /// Current slot assignments.
    pub fn slot_table(&self) -> &SlotTable {
        &self.slots
    }

    /// Number of open client channels.
    pub fn open_links(&self) -> usize {
        self.registry.open_count()
    }

    /// Evict a participant from their slot (they stay connected as a
    /// spectator).
    pub fn kick(&mut self, participant: ParticipantId) {
        if self.slots.clear_participant(participant).is_some() {
            self.broadcast_role_answer();
        }
    }

    /// Block a guest slot against joins, or unblock it.
    pub fn set_slot_disabled(&mut self, slot: PlayerSlot, disabled: bool) {
        if self.slots.set_disabled(slot, disabled) {
            self.broadcast_role_answer();
        }
    }

    /// Tear down every link. Idempotent.
    pub fn shutdown(&mut self) {
        self.registry.close_all();
        self.prev_frame.clear();
    }

    // ── Signaling ────────────────────────────────────────────────

    fn on_signal(&mut self, from: ParticipantId, signal: Signal) {
        match signal.kind {
            SignalKind::Offer => {
                let (generation, answer) = self.registry.accept(from, &signal);
                debug!(from, generation, "accepted offer");
                self.transport.send_signal(from, answer);
            }
            SignalKind::IceCandidate => self.transport.apply_signal(from, &signal),
            SignalKind::Answer => {
                warn!(from, "unexpected answer signal on host; dropped");
            }
        }
    }

    // ── Link lifecycle ───────────────────────────────────────────

    fn on_channel_closed(&mut self, participant: ParticipantId, generation: u64) {
        if !self.registry.matches(participant, generation) {
            return;
        }
        self.registry.close(participant);

        let nickname = self
            .slots
            .clear_participant(participant)
            .map(|b| b.nickname)
            .unwrap_or_default();
        info!(participant, nickname, "client left");

        self.broadcast_role_answer();
        self.broadcast_system_text(format!("left: {nickname}"));
    }

    // ── Inbound traffic ──────────────────────────────────────────

    fn on_payload(&mut self, participant: ParticipantId, generation: u64, payload: WirePayload) {
        if !self.registry.matches(participant, generation) {
            return;
        }
        match payload {
            WirePayload::Text(text) => {
                if let Err(err) = self.on_text(participant, &text) {
                    // Protocol violation: drop the message, keep the link.
                    warn!(participant, %err, "dropped malformed message");
                }
            }
            WirePayload::Binary(_) => {
                warn!(participant, "client sent a binary frame; dropped");
            }
        }
    }

    fn on_text(&mut self, participant: ParticipantId, raw: &str) -> Result<(), NetplayError> {
        let msg = ChannelMessage::decode(raw)?;
        match msg {
            ChannelMessage::ChatText { .. } => {
                // Relay verbatim to everyone else, then surface locally.
                self.registry.for_each_open_channel(|peer, link| {
                    if peer != participant {
                        link.send(WirePayload::Text(raw.to_owned()));
                    }
                });
                self.emit(LocalEvent::Message(msg));
            }
            ChannelMessage::KeyDown { meta, button, .. } => {
                if let Some(slot) = self.slots.slot_of(participant) {
                    self.emit(LocalEvent::Message(ChannelMessage::KeyDown {
                        meta,
                        button,
                        slot,
                    }));
                }
            }
            ChannelMessage::KeyUp { meta, button, .. } => {
                if let Some(slot) = self.slots.slot_of(participant) {
                    self.emit(LocalEvent::Message(ChannelMessage::KeyUp {
                        meta,
                        button,
                        slot,
                    }));
                }
            }
            ChannelMessage::PointerMove {
                meta,
                x,
                y,
                dx,
                dy,
                ..
            } => {
                if let Some(slot) = self.slots.slot_of(participant) {
                    self.emit(LocalEvent::Message(ChannelMessage::PointerMove {
                        meta,
                        x,
                        y,
                        dx,
                        dy,
                        slot,
                    }));
                }
            }
            ChannelMessage::RoleOffer { meta, request } => {
                // The link peer is authoritative; the header only
                // contributes the display names.
                let binding =
                    RoleBinding::new(participant, &*meta.username, &*meta.nickname);
                self.slots.apply_offer(binding, request);
                self.broadcast_role_answer();
            }
            ChannelMessage::Ping { .. } => {
                // The verbatim echo is the pong.
                if let Some(link) = self.registry.link(participant) {
                    link.send(WirePayload::Text(raw.to_owned()));
                }
                if self.registry.mark_pinged(participant) {
                    debug!(participant, "first ping; channel is frame-ready");
                    self.whole_frame_next = true;
                }
            }
            ChannelMessage::RoleAnswer { .. } => {
                return Err(NetplayError::ProtocolViolation(
                    "role answer is host-originated",
                ));
            }
        }
        Ok(())
    }

    // ── Frame broadcast ──────────────────────────────────────────

    fn on_frame(&mut self, pixels: &Bytes, frame_number: u64) {
        if self.registry.open_count() == 0 {
            // Nobody watching: forget the retained raster so the next
            // viewer starts from a whole frame.
            self.prev_frame.clear();
            return;
        }
        if self.config.cadence == FrameCadence::EverySecondFrame && frame_number % 2 != 0 {
            return;
        }

        let whole = self.whole_frame_next;
        let encoded =
            match encode_frame_diff(&self.prev_frame, pixels, self.config.width, whole) {
                Ok(encoded) => encoded,
                Err(err) => {
                    warn!(frame_number, %err, "frame encode failed; skipped");
                    return;
                }
            };
        self.prev_frame.clear();
        self.prev_frame.extend_from_slice(pixels);
        self.whole_frame_next = false;

        if encoded.is_empty() {
            return;
        }
        self.registry.for_each_open_channel(|_, link| {
            // Hold frames until the client's first ping proves its
            // playback pipeline is up.
            if link.client_has_pinged() {
                link.send(WirePayload::Binary(encoded.payload.clone()));
            }
        });
    }

    // ── Broadcast helpers ────────────────────────────────────────

    fn role_answer(&self) -> ChannelMessage {
        ChannelMessage::RoleAnswer {
            meta: MessageMeta::new(
                self.identity.participant_id,
                &*self.identity.username,
                &*self.identity.nickname,
            ),
            slots: self.slots.snapshot(),
        }
    }

    fn broadcast_role_answer(&mut self) {
        let msg = self.role_answer();
        self.broadcast(&msg);
    }

    fn broadcast_system_text(&mut self, text: String) {
        let msg = ChannelMessage::ChatText {
            meta: MessageMeta::system(),
            text,
        };
        self.broadcast(&msg);
    }

    /// Send to every open channel and emit on the local stream.
    fn broadcast(&mut self, msg: &ChannelMessage) {
        match msg.encode() {
            Ok(text) => {
                self.registry.for_each_open_channel(|_, link| {
                    link.send(WirePayload::Text(text.clone()));
                });
                self.emit(LocalEvent::Message(msg.clone()));
            }
            Err(err) => warn!(%err, "broadcast encode failed"),
        }
    }

    fn emit(&self, event: LocalEvent) {
        // The UI side may already be gone during teardown.
        let _ = self.events.send(event);
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::frame::decode_frame;
    use crate::message::unix_millis;
    use crate::transport::LinkChannel;

    const HOST: ParticipantId = 1;

    /// Transport double recording signals and per-peer channel traffic.
    #[derive(Default)]
    struct MockTransport {
        signals: Mutex<Vec<(ParticipantId, Signal)>>,
        sent: Arc<Mutex<Vec<(ParticipantId, WirePayload)>>>,
        generations: Mutex<Vec<u64>>,
    }

    struct MockChannel {
        peer: ParticipantId,
        sent: Arc<Mutex<Vec<(ParticipantId, WirePayload)>>>,
    }

    impl LinkChannel for MockChannel {
        fn send(&self, payload: WirePayload) {
            self.sent.lock().unwrap().push((self.peer, payload));
        }
        fn close(&self) {}
    }

    impl PeerTransport for MockTransport {
        fn connect(&self, peer: ParticipantId, generation: u64) -> (Box<dyn LinkChannel>, Signal) {
            self.generations.lock().unwrap().push(generation);
            (
                Box::new(MockChannel {
                    peer,
                    sent: Arc::clone(&self.sent),
                }),
                Signal::offer("sdp"),
            )
        }
        fn accept(
            &self,
            peer: ParticipantId,
            generation: u64,
            _offer: &Signal,
        ) -> (Box<dyn LinkChannel>, Signal) {
            self.generations.lock().unwrap().push(generation);
            (
                Box::new(MockChannel {
                    peer,
                    sent: Arc::clone(&self.sent),
                }),
                Signal::answer("sdp"),
            )
        }
        fn send_signal(&self, to: ParticipantId, signal: Signal) {
            self.signals.lock().unwrap().push((to, signal));
        }
        fn apply_signal(&self, _peer: ParticipantId, _signal: &Signal) {}
    }

    struct Fixture {
        host: HostRole,
        events: mpsc::UnboundedReceiver<LocalEvent>,
        transport: Arc<MockTransport>,
    }

    impl Fixture {
        fn new() -> Self {
            let transport = Arc::new(MockTransport::default());
            let (mut host, events) = HostRole::new(
                RoleBinding::new(HOST, "host", "Host"),
                Arc::clone(&transport) as Arc<dyn PeerTransport>,
                HostConfig {
                    width: 4,
                    cadence: FrameCadence::EveryFrame,
                },
            );
            host.start();
            Self {
                host,
                events,
                transport,
            }
        }

        /// Offer + channel-open for a client, returning its generation.
        fn join(&mut self, client: ParticipantId) -> u64 {
            self.host.handle_event(SessionEvent::Signal {
                from: client,
                signal: Signal::offer("sdp"),
            });
            let generation = *self.transport.generations.lock().unwrap().last().unwrap();
            self.host.handle_event(SessionEvent::ChannelOpen {
                participant: client,
                generation,
            });
            generation
        }

        fn deliver(&mut self, client: ParticipantId, generation: u64, msg: &ChannelMessage) {
            self.host.handle_event(SessionEvent::Message {
                participant: client,
                generation,
                payload: WirePayload::Text(msg.encode().unwrap()),
            });
        }

        fn drain_events(&mut self) -> Vec<LocalEvent> {
            let mut out = Vec::new();
            while let Ok(ev) = self.events.try_recv() {
                out.push(ev);
            }
            out
        }

        fn sent(&self) -> Vec<(ParticipantId, WirePayload)> {
            self.transport.sent.lock().unwrap().clone()
        }
    }

    fn guest_meta(id: ParticipantId) -> MessageMeta {
        MessageMeta::new(id, format!("user{id}"), format!("Guest {id}"))
    }

    fn ping(id: ParticipantId) -> ChannelMessage {
        ChannelMessage::Ping {
            meta: guest_meta(id),
            prev_latency_ms: None,
        }
    }

    fn raster(fill: u8) -> Bytes {
        Bytes::from(vec![fill; 4 * 4 * 4])
    }

    #[test]
    fn offer_is_answered() {
        let mut fx = Fixture::new();
        fx.host.handle_event(SessionEvent::Signal {
            from: 42,
            signal: Signal::offer("sdp"),
        });
        let signals = fx.transport.signals.lock().unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].0, 42);
        assert_eq!(signals[0].1.kind, SignalKind::Answer);
    }

    #[test]
    fn auto_role_offer_binds_slot_two_and_broadcasts() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);
        fx.drain_events();

        fx.deliver(
            42,
            generation,
            &ChannelMessage::RoleOffer {
                meta: guest_meta(42),
                request: crate::slots::SlotRequest::Auto,
            },
        );

        assert_eq!(fx.host.slot_table().slot_of(42), Some(PlayerSlot::Two));
        // Broadcast on the channel…
        let sent = fx.sent();
        assert!(matches!(&sent[..], [(42, WirePayload::Text(text))] if text.contains("\"type\":4")));
        // …and on the local stream.
        match &fx.drain_events()[..] {
            [LocalEvent::Message(ChannelMessage::RoleAnswer { slots, .. })] => {
                assert_eq!(slots[&1].participant_id, 42);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn role_offer_seats_the_link_peer_not_the_claimed_id() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);

        // The header claims a different participant; the seat goes to
        // the link peer anyway.
        fx.deliver(
            42,
            generation,
            &ChannelMessage::RoleOffer {
                meta: guest_meta(43),
                request: crate::slots::SlotRequest::Auto,
            },
        );

        assert_eq!(fx.host.slot_table().slot_of(42), Some(PlayerSlot::Two));
        assert_eq!(fx.host.slot_table().slot_of(43), None);
        // The display names still come from the header.
        let binding = fx.host.slot_table().get(PlayerSlot::Two).unwrap();
        assert_eq!(binding.nickname, "Guest 43");
    }

    #[test]
    fn disconnect_clears_slot_and_announces_departure() {
        let mut fx = Fixture::new();
        let g42 = fx.join(42);
        fx.join(43);
        fx.deliver(
            42,
            g42,
            &ChannelMessage::RoleOffer {
                meta: guest_meta(42),
                request: crate::slots::SlotRequest::Auto,
            },
        );
        fx.drain_events();
        fx.transport.sent.lock().unwrap().clear();

        fx.host.handle_event(SessionEvent::ChannelClosed {
            participant: 42,
            generation: g42,
        });

        assert_eq!(fx.host.slot_table().slot_of(42), None);
        assert_eq!(fx.host.open_links(), 1);

        // The remaining client got the fresh table and the announcement.
        let texts: Vec<_> = fx
            .sent()
            .into_iter()
            .map(|(peer, payload)| {
                assert_eq!(peer, 43);
                match payload {
                    WirePayload::Text(text) => text,
                    other => panic!("unexpected payload: {other:?}"),
                }
            })
            .collect();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("\"type\":4"));
        assert!(texts[1].contains("left: Guest 42"));
    }

    #[test]
    fn stale_close_event_is_ignored() {
        let mut fx = Fixture::new();
        let first = fx.join(42);
        let second = fx.join(42); // replacement link
        assert_ne!(first, second);

        fx.host.handle_event(SessionEvent::ChannelClosed {
            participant: 42,
            generation: first,
        });
        assert_eq!(fx.host.open_links(), 1);
    }

    #[test]
    fn input_from_bound_participant_is_retagged() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);
        fx.deliver(
            42,
            generation,
            &ChannelMessage::RoleOffer {
                meta: guest_meta(42),
                request: crate::slots::SlotRequest::Auto,
            },
        );
        fx.drain_events();

        fx.deliver(
            42,
            generation,
            &ChannelMessage::KeyDown {
                meta: guest_meta(42),
                button: 7,
                slot: PlayerSlot::One, // sender's claim is overwritten
            },
        );
        match &fx.drain_events()[..] {
            [LocalEvent::Message(ChannelMessage::KeyDown { button, slot, .. })] => {
                assert_eq!(*button, 7);
                assert_eq!(*slot, PlayerSlot::Two);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn input_from_unbound_participant_is_dropped() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);
        fx.drain_events();

        fx.deliver(
            42,
            generation,
            &ChannelMessage::KeyDown {
                meta: guest_meta(42),
                button: 7,
                slot: PlayerSlot::Two,
            },
        );
        assert!(fx.drain_events().is_empty());
    }

    #[test]
    fn chat_is_relayed_to_other_channels_only() {
        let mut fx = Fixture::new();
        let g42 = fx.join(42);
        fx.join(43);
        fx.drain_events();

        fx.deliver(
            42,
            g42,
            &ChannelMessage::ChatText {
                meta: guest_meta(42),
                text: "gg".into(),
            },
        );

        let sent = fx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 43);
        assert!(matches!(
            &fx.drain_events()[..],
            [LocalEvent::Message(ChannelMessage::ChatText { .. })]
        ));
    }

    #[test]
    fn ping_is_echoed_verbatim() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);

        let msg = ChannelMessage::Ping {
            meta: guest_meta(42),
            prev_latency_ms: None,
        };
        let raw = msg.encode().unwrap();
        fx.host.handle_event(SessionEvent::Message {
            participant: 42,
            generation,
            payload: WirePayload::Text(raw.clone()),
        });

        let sent = fx.sent();
        assert!(matches!(&sent[..], [(42, WirePayload::Text(echo))] if *echo == raw));
    }

    #[test]
    fn frames_are_gated_on_first_ping() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);

        fx.host.handle_event(SessionEvent::Frame {
            pixels: raster(0x10),
            frame_number: 0,
        });
        assert!(fx.sent().is_empty(), "frame sent before ping");

        fx.deliver(42, generation, &ping(42));
        fx.transport.sent.lock().unwrap().clear();

        fx.host.handle_event(SessionEvent::Frame {
            pixels: raster(0x20),
            frame_number: 1,
        });
        let sent = fx.sent();
        assert!(matches!(&sent[..], [(42, WirePayload::Binary(_))]));
    }

    #[test]
    fn identical_frames_are_not_sent() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);
        fx.deliver(42, generation, &ping(42));
        fx.host.handle_event(SessionEvent::Frame {
            pixels: raster(0x10),
            frame_number: 0,
        });
        fx.transport.sent.lock().unwrap().clear();

        fx.host.handle_event(SessionEvent::Frame {
            pixels: raster(0x10),
            frame_number: 1,
        });
        assert!(fx.sent().is_empty());
    }

    #[test]
    fn first_frame_after_ping_is_whole() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);
        fx.deliver(42, generation, &ping(42));
        fx.transport.sent.lock().unwrap().clear();

        fx.host.handle_event(SessionEvent::Frame {
            pixels: raster(0x10),
            frame_number: 0,
        });
        let sent = fx.sent();
        let WirePayload::Binary(payload) = &sent[0].1 else {
            panic!("expected binary frame");
        };
        let decoded = decode_frame(payload).unwrap();
        assert_eq!(decoded.region.y_line, 0);
        assert_eq!(decoded.region.height_lines, 4);
    }

    #[test]
    fn every_second_frame_cadence_skips_odd_frames() {
        let transport = Arc::new(MockTransport::default());
        let (mut host, _events) = HostRole::new(
            RoleBinding::new(HOST, "host", "Host"),
            Arc::clone(&transport) as Arc<dyn PeerTransport>,
            HostConfig {
                width: 4,
                cadence: FrameCadence::EverySecondFrame,
            },
        );
        host.start();
        let mut fx = Fixture {
            host,
            events: mpsc::unbounded_channel().1,
            transport,
        };
        let generation = fx.join(42);
        fx.deliver(42, generation, &ping(42));
        fx.transport.sent.lock().unwrap().clear();

        fx.host.handle_event(SessionEvent::Frame {
            pixels: raster(0x10),
            frame_number: 1,
        });
        assert!(fx.sent().is_empty());

        fx.host.handle_event(SessionEvent::Frame {
            pixels: raster(0x10),
            frame_number: 2,
        });
        assert_eq!(fx.sent().len(), 1);
    }

    #[test]
    fn malformed_message_keeps_link_open() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);

        fx.host.handle_event(SessionEvent::Message {
            participant: 42,
            generation,
            payload: WirePayload::Text("not json".into()),
        });
        assert_eq!(fx.host.open_links(), 1);
        assert!(fx.host.needs_frame());
    }

    #[test]
    fn kick_releases_slot_and_broadcasts() {
        let mut fx = Fixture::new();
        let generation = fx.join(42);
        fx.deliver(
            42,
            generation,
            &ChannelMessage::RoleOffer {
                meta: guest_meta(42),
                request: crate::slots::SlotRequest::Auto,
            },
        );
        fx.transport.sent.lock().unwrap().clear();

        fx.host.kick(42);
        assert_eq!(fx.host.slot_table().slot_of(42), None);
        assert_eq!(fx.host.open_links(), 1, "kick does not drop the link");
        assert_eq!(fx.sent().len(), 1);
    }

    #[test]
    fn ping_timestamp_is_recent() {
        // Guards the latency computation contract: timestamps are unix
        // milliseconds set at construction.
        let msg = ping(42);
        assert!(unix_millis() - msg.meta().timestamp < 1_000);
    }
}
