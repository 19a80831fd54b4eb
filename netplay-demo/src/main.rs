//! Netplay demo — entry point.
//!
//! ```text
//! netplay-demo                   Run a host plus guests in-process
//! netplay-demo --config <path>   Load a custom config TOML
//! netplay-demo --guests <n>      Override the guest count
//! netplay-demo --gen-config      Write default config to stdout
//! ```
//!
//! The demo runs one host and a handful of guests over the in-process
//! hub, feeds the host a synthetic animation, and logs what each side
//! observes: slot assignments, join/leave chat, frame deliveries, and
//! (optionally) a mid-run link drop with the automatic reconnect.

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use netplay_core::{
    ChannelMessage, ClientConfig, ClientRole, FrameCadence, HostConfig, HostRole, LocalEvent,
    MemoryHub, ParticipantId, RoleBinding, SessionEvent,
};

use crate::config::DemoConfig;

mod config;

const HOST_ID: ParticipantId = 1;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "netplay-demo", about = "In-process netplay session demo")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "netplay-demo.toml")]
    config: PathBuf,

    /// Override the number of guests.
    #[arg(long)]
    guests: Option<u8>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&DemoConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = DemoConfig::load(&cli.config);
    if let Some(guests) = cli.guests {
        config.session.guests = guests;
    }
    config.session.guests = config.session.guests.min(3);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("netplay-demo v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "raster: {}x{} @ {} fps, guests: {}",
        config.video.width, config.video.height, config.video.fps, config.session.guests
    );

    let hub = MemoryHub::new();

    // Host role with its frame feed.
    let (host_tx, host_rx) = mpsc::unbounded_channel();
    let transport = hub.endpoint(HOST_ID, host_tx.clone());
    let cadence = match config.video.cadence.as_str() {
        "second" => FrameCadence::EverySecondFrame,
        _ => FrameCadence::EveryFrame,
    };
    let (mut host, host_events) = HostRole::new(
        RoleBinding::new(HOST_ID, "host", "Host"),
        transport,
        HostConfig {
            width: config.video.width,
            cadence,
        },
    );
    host.start();
    tokio::spawn(host.run(host_rx));
    tokio::spawn(watch_events("host", host_events));

    // Guests.
    let mut guest_feeds = Vec::new();
    for i in 0..config.session.guests {
        let id = 100 + ParticipantId::from(i);
        let nickname = format!("Guest {}", i + 1);
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let transport = hub.endpoint(id, session_tx.clone());
        let (mut client, events) = ClientRole::new(
            RoleBinding::new(id, format!("guest{id}"), &nickname),
            HOST_ID,
            transport,
            ClientConfig::new(config.video.width, config.video.height),
        );
        client.start();
        tokio::spawn(client.run(session_rx));
        tokio::spawn(watch_events(nickname.leak(), events));
        guest_feeds.push((id, session_tx));
    }

    // Synthetic animation into the host, one frame per tick.
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / config.video.fps.max(1));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(config.session.duration_secs);
    let sever_at = deadline - Duration::from_secs(config.session.duration_secs / 2);
    let mut severed = false;
    let mut frame_number = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let pixels = render(frame_number, config.video.width, config.video.height);
                if host_tx.send(SessionEvent::Frame { pixels, frame_number }).is_err() {
                    break;
                }
                frame_number += 1;
            }
            _ = tokio::time::sleep_until(sever_at), if config.session.sever_demo
                && !severed
                && !guest_feeds.is_empty() =>
            {
                let id = guest_feeds[0].0;
                info!(guest = id, "dropping link to demonstrate reconnect");
                hub.sever(HOST_ID, id);
                severed = true;
            }
            _ = tokio::time::sleep_until(deadline) => break,
        }
    }

    info!("session over; shutting down");
    let _ = host_tx.send(SessionEvent::Shutdown);
    for (_, feed) in &guest_feeds {
        let _ = feed.send(SessionEvent::Shutdown);
    }
    // Give the run loops a beat to close their links.
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}

/// Log a role's local event stream.
async fn watch_events(who: &'static str, mut events: mpsc::UnboundedReceiver<LocalEvent>) {
    let mut frames = 0u64;
    while let Some(event) = events.recv().await {
        match event {
            LocalEvent::Message(ChannelMessage::ChatText { meta, text }) => {
                if meta.is_system() {
                    info!("[{who}] * {text}");
                } else {
                    info!("[{who}] <{}> {text}", meta.nickname);
                }
            }
            LocalEvent::Message(ChannelMessage::RoleAnswer { slots, .. }) => {
                let seats: Vec<String> = slots
                    .iter()
                    .map(|(number, binding)| format!("P{}={}", number + 1, binding.nickname))
                    .collect();
                info!("[{who}] slots: {}", seats.join(" "));
            }
            LocalEvent::Message(msg) => {
                debug!("[{who}] {:?}", msg.kind());
            }
            LocalEvent::Frame(raster) => {
                frames += 1;
                if frames % 60 == 0 {
                    debug!("[{who}] {frames} frames composited ({} bytes)", raster.len());
                }
            }
        }
    }
}

/// A cheap animation: a bright band sweeping down an otherwise static
/// gradient, so most frames differ in only a few scanlines.
fn render(frame_number: u64, width: u32, height: u32) -> Bytes {
    let mut pixels = vec![0u8; (width * height) as usize * 4];
    let band = (frame_number % u64::from(height)) as u32;
    for y in 0..height {
        let lum = if y == band { 0xFF } else { (y % 0x60) as u8 };
        for x in 0..width {
            let at = ((y * width + x) * 4) as usize;
            pixels[at] = lum;
            pixels[at + 1] = lum / 2;
            pixels[at + 2] = (x % 0xFF) as u8;
            pixels[at + 3] = 0xFF;
        }
    }
    Bytes::from(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_changes_few_scanlines_between_frames() {
        let a = render(0, 16, 16);
        let b = render(1, 16, 16);
        let line = 16 * 4;
        let changed = (0..16)
            .filter(|y| a[y * line..(y + 1) * line] != b[y * line..(y + 1) * line])
            .count();
        assert_eq!(changed, 2);
    }
}
