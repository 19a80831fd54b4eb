//! The client (viewer/guest) role.
//!
//! A client keeps exactly one link to the host. It offers a connection,
//! pings once a second to measure latency and prove liveness, sends its
//! input upstream, and composites the host's frame diffs onto a locally
//! retained raster. If the link dies while the role is still active it
//! restarts the connection after a fixed delay.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::NetplayError;
use crate::frame::{composite, decode_frame, PIXEL_BYTES};
use crate::message::{unix_millis, ChannelMessage, MessageMeta, ParticipantId, WirePayload};
use crate::registry::ConnectionRegistry;
use crate::signal::{Signal, SignalKind};
use crate::slots::{PlayerSlot, RoleBinding, SlotRequest, SlotSnapshot};
use crate::transport::{LocalEvent, PeerTransport, SessionEvent};

// ── Configuration ────────────────────────────────────────────────

/// Client role configuration. The defaults match the protocol's timing
/// contract; change them only for tests.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Raster width in pixels.
    pub width: u32,
    /// Raster height in pixels.
    pub height: u32,
    /// Delay before re-offering after the link drops.
    pub restart_delay: Duration,
    /// Interval between pings once the link is open.
    pub ping_interval: Duration,
    /// No frame for this long while streaming counts as a stall.
    pub stall_timeout: Duration,
}

impl ClientConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            restart_delay: Duration::from_millis(2_000),
            ping_interval: Duration::from_millis(1_000),
            stall_timeout: Duration::from_millis(2_000),
        }
    }
}

/// Where the client is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Constructed, not yet started.
    Idle,
    /// Offer sent, waiting for the host's answer.
    AwaitingAnswer,
    /// Channel open, no frame received yet.
    LinkOpen,
    /// Frames are flowing.
    Streaming,
    /// Was streaming, but frames stopped arriving.
    Stalled,
    /// Destroyed. Terminal.
    Closed,
}

// ── ClientRole ───────────────────────────────────────────────────

/// Per-session client state: the single host link, the local slot
/// snapshot, and the composited raster.
pub struct ClientRole {
    identity: RoleBinding,
    host: ParticipantId,
    transport: Arc<dyn PeerTransport>,
    registry: ConnectionRegistry,
    events: mpsc::UnboundedSender<LocalEvent>,
    config: ClientConfig,
    phase: ClientPhase,
    /// Last slot table announced by the host.
    slots: SlotSnapshot,
    /// Slot held before the last disconnect; re-requested on reconnect.
    prior_slot: Option<PlayerSlot>,
    latency_ms: Option<u64>,
    /// Retained raster that frame diffs composite onto.
    framebuffer: Vec<u8>,
    last_frame_at: Option<Instant>,
    restart_deadline: Option<Instant>,
    active: bool,
}

impl ClientRole {
    /// Create the role and the local event stream its UI consumes.
    pub fn new(
        identity: RoleBinding,
        host: ParticipantId,
        transport: Arc<dyn PeerTransport>,
        config: ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<LocalEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let framebuffer = vec![0; (config.width * config.height) as usize * PIXEL_BYTES];
        let role = Self {
            registry: ConnectionRegistry::new(Arc::clone(&transport)),
            identity,
            host,
            transport,
            events,
            config,
            phase: ClientPhase::Idle,
            slots: SlotSnapshot::new(),
            prior_slot: None,
            latency_ms: None,
            framebuffer,
            last_frame_at: None,
            restart_deadline: None,
            active: false,
        };
        (role, rx)
    }

    /// Offer a connection to the host and arm the restart timer.
    pub fn start(&mut self) {
        info!(
            client = self.identity.participant_id,
            host = self.host,
            "client role started"
        );
        self.active = true;
        self.offer();
    }

    /// Drive the role from its event queue until `Shutdown` or until
    /// the queue's senders are gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let restart_at = self.restart_deadline;
            tokio::select! {
                event = rx.recv() => match event {
                    None | Some(SessionEvent::Shutdown) => break,
                    Some(event) => self.handle_event(event),
                },
                _ = ping.tick() => self.on_ping_tick(),
                _ = sleep_until_or_never(restart_at), if restart_at.is_some() => {
                    self.on_restart_timeout();
                }
            }
        }
        self.destroy();
    }

    /// Process one event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Signal { from, signal } => self.on_signal(from, signal),
            SessionEvent::ChannelOpen {
                participant,
                generation,
            } => self.on_channel_open(participant, generation),
            SessionEvent::ChannelClosed {
                participant,
                generation,
            } => self.on_channel_closed(participant, generation),
            SessionEvent::Message {
                participant,
                generation,
                payload,
            } => self.on_payload(participant, generation, payload),
            SessionEvent::Frame { .. } => {
                debug!("client role does not source frames; ignored");
            }
            SessionEvent::Shutdown => self.destroy(),
        }
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    /// Most recent round-trip measurement, if any.
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency_ms
    }

    /// The host's last slot table.
    pub fn slots(&self) -> &SlotSnapshot {
        &self.slots
    }

    // ── Outbound traffic ─────────────────────────────────────────

    pub fn send_chat(&mut self, text: impl Into<String>) {
        let msg = ChannelMessage::ChatText {
            meta: self.meta(),
            text: text.into(),
        };
        self.send(&msg);
    }

    pub fn send_key_down(&mut self, button: u8) {
        let msg = ChannelMessage::KeyDown {
            meta: self.meta(),
            button,
            // The host re-tags with the authoritative slot.
            slot: PlayerSlot::One,
        };
        self.send(&msg);
    }

    pub fn send_key_up(&mut self, button: u8) {
        let msg = ChannelMessage::KeyUp {
            meta: self.meta(),
            button,
            slot: PlayerSlot::One,
        };
        self.send(&msg);
    }

    pub fn send_pointer_move(&mut self, x: f32, y: f32, dx: f32, dy: f32) {
        let msg = ChannelMessage::PointerMove {
            meta: self.meta(),
            x,
            y,
            dx,
            dy,
            slot: PlayerSlot::One,
        };
        self.send(&msg);
    }

    /// Ask the host for a slot (or to release the current one).
    pub fn request_slot(&mut self, request: SlotRequest) {
        let msg = ChannelMessage::RoleOffer {
            meta: self.meta(),
            request,
        };
        self.send(&msg);
    }

    // ── Timers ───────────────────────────────────────────────────

    /// Periodic ping; also where stalls are detected.
    pub fn on_ping_tick(&mut self) {
        if !matches!(
            self.phase,
            ClientPhase::LinkOpen | ClientPhase::Streaming | ClientPhase::Stalled
        ) {
            return;
        }
        self.send_ping();

        if self.phase == ClientPhase::Streaming {
            let stalled = self
                .last_frame_at
                .is_some_and(|at| at.elapsed() > self.config.stall_timeout);
            if stalled {
                warn!("no frame within stall timeout");
                self.phase = ClientPhase::Stalled;
            }
        }
    }

    /// Restart timer expiry: re-offer if the role is still active.
    pub fn on_restart_timeout(&mut self) {
        self.restart_deadline = None;
        if self.active {
            info!("restarting connection to host");
            self.offer();
        }
    }

    /// Tear everything down. Idempotent, and terminal: a destroyed
    /// role never restarts.
    pub fn destroy(&mut self) {
        if !self.active && self.phase == ClientPhase::Closed {
            return;
        }
        self.active = false;
        self.restart_deadline = None;
        self.latency_ms = None;
        self.registry.close_all();
        self.phase = ClientPhase::Closed;
    }

    // ── Signaling ────────────────────────────────────────────────

    fn offer(&mut self) {
        let (generation, offer) = self.registry.connect(self.host);
        debug!(generation, "offer sent");
        self.transport.send_signal(self.host, offer);
        self.phase = ClientPhase::AwaitingAnswer;
        self.restart_deadline = Some(Instant::now() + self.config.restart_delay);
    }

    fn on_signal(&mut self, from: ParticipantId, signal: Signal) {
        if from != self.host {
            return;
        }
        match signal.kind {
            SignalKind::Answer => {
                // The host responded; hold the restart timer.
                self.restart_deadline = None;
                self.transport.apply_signal(from, &signal);
            }
            SignalKind::IceCandidate => self.transport.apply_signal(from, &signal),
            SignalKind::Offer => {
                warn!("unexpected offer signal on client; dropped");
            }
        }
    }

    // ── Link lifecycle ───────────────────────────────────────────

    fn on_channel_open(&mut self, participant: ParticipantId, generation: u64) {
        if participant != self.host || !self.registry.mark_open(participant, generation) {
            return;
        }
        debug!(generation, "channel to host open");
        self.phase = ClientPhase::LinkOpen;
        self.restart_deadline = None;
        self.last_frame_at = None;

        // Reclaim the slot held before a disconnect, otherwise take
        // whatever is free.
        let request = match self.prior_slot {
            Some(slot) => SlotRequest::Slot(slot),
            None => SlotRequest::Auto,
        };
        self.request_slot(request);
        let joined = ChannelMessage::ChatText {
            meta: MessageMeta::system(),
            text: format!("joined: {}", self.identity.nickname),
        };
        self.send(&joined);
        // First ping immediately so the host unlocks frames.
        self.send_ping();
    }

    fn on_channel_closed(&mut self, participant: ParticipantId, generation: u64) {
        if participant != self.host || !self.registry.matches(participant, generation) {
            return;
        }
        self.registry.close(participant);
        info!("channel to host closed");

        // Reflect our own departure locally; the host's next answer is
        // authoritative once we are back.
        self.prior_slot = self.own_slot();
        if let Some(slot) = self.prior_slot {
            self.slots.remove(&(slot as u8));
        }
        self.emit(LocalEvent::Message(ChannelMessage::RoleAnswer {
            meta: MessageMeta::system(),
            slots: self.slots.clone(),
        }));

        self.latency_ms = None;
        if self.active {
            // Reconnect right away; the timer armed by `offer` covers
            // the case where this new offer goes unanswered.
            self.offer();
        }
    }

    // ── Inbound traffic ──────────────────────────────────────────

    fn on_payload(&mut self, participant: ParticipantId, generation: u64, payload: WirePayload) {
        if participant != self.host || !self.registry.matches(participant, generation) {
            return;
        }
        let result = match payload {
            WirePayload::Text(text) => self.on_text(&text),
            WirePayload::Binary(bytes) => self.on_frame_payload(&bytes),
        };
        if let Err(err) = result {
            warn!(%err, "dropped malformed payload from host");
        }
    }

    fn on_text(&mut self, raw: &str) -> Result<(), NetplayError> {
        let msg = ChannelMessage::decode(raw)?;
        match msg {
            ChannelMessage::Ping { ref meta, .. } => {
                // Our own ping, echoed back: the round trip is done.
                self.latency_ms = Some(unix_millis().saturating_sub(meta.timestamp));
            }
            ChannelMessage::RoleAnswer { ref slots, .. } => {
                self.slots = slots.clone();
                self.prior_slot = self.own_slot();
                self.emit(LocalEvent::Message(msg));
            }
            ChannelMessage::ChatText { .. } => self.emit(LocalEvent::Message(msg)),
            // Everything else (observed input and the like) is for the
            // local UI to interpret.
            other => self.emit(LocalEvent::Message(other)),
        }
        Ok(())
    }

    fn on_frame_payload(&mut self, payload: &[u8]) -> Result<(), NetplayError> {
        let frame = decode_frame(payload)?;
        composite(&mut self.framebuffer, &frame, self.config.width)?;
        self.last_frame_at = Some(Instant::now());
        self.phase = ClientPhase::Streaming;
        self.emit(LocalEvent::Frame(Bytes::copy_from_slice(&self.framebuffer)));
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn own_slot(&self) -> Option<PlayerSlot> {
        self.slots.iter().find_map(|(&number, binding)| {
            (binding.participant_id == self.identity.participant_id)
                .then(|| PlayerSlot::try_from(number).ok())
                .flatten()
        })
    }

    fn send_ping(&mut self) {
        let msg = ChannelMessage::Ping {
            meta: self.meta(),
            prev_latency_ms: self.latency_ms,
        };
        self.send(&msg);
    }

    fn meta(&self) -> MessageMeta {
        MessageMeta::new(
            self.identity.participant_id,
            &*self.identity.username,
            &*self.identity.nickname,
        )
    }

    fn send(&mut self, msg: &ChannelMessage) {
        let Some(link) = self.registry.link(self.host).filter(|l| l.is_open()) else {
            debug!(kind = ?msg.kind(), "no open link to host; dropped");
            return;
        };
        match msg.encode() {
            Ok(text) => link.send(WirePayload::Text(text)),
            Err(err) => warn!(%err, "encode failed"),
        }
    }

    fn emit(&self, event: LocalEvent) {
        let _ = self.events.send(event);
    }
}

async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────
