// phylink test application -- CLI tool for exercising channels over the
// stock transports (TCP client, TCP server, serial) against real endpoints.
//
// Usage:
//   phylink-test-app tcp-client --addr 127.0.0.1:20000
//   phylink-test-app tcp-client --addr 10.0.0.5:20000 --send "05 64 05 c0" --duration 10
//   phylink-test-app tcp-server --listen 0.0.0.0:20000
//   phylink-test-app serial --port /dev/ttyUSB0 --baud 9600
//
// The app opens one channel, keeps a read armed, prints every frame it
// receives as hex, and optionally writes a payload once the link is up.
// Ctrl-C closes the link cleanly before exiting.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use bytes::{Bytes, BytesMut};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use phylink::transport::SerialConfig;
use phylink::{ChannelHandle, Manager, UpperLayer};

/// Read buffer capacity, sized for a maximal link-layer frame.
const READ_CAPACITY: usize = 4096;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// phylink test application -- exercises transports from the command line.
#[derive(Parser)]
#[command(name = "phylink-test-app", version, about)]
struct Cli {
    /// Hex payload to write once the link comes up (e.g. "05 64 05 c0" or "056405c0").
    #[arg(long)]
    send: Option<String>,

    /// Run duration in seconds (0 = run until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    duration: u64,

    /// Number of reopen attempts after an open failure.
    #[arg(long, default_value_t = 3)]
    retries: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dial out to a TCP endpoint (master side).
    TcpClient {
        /// Remote address (e.g. 127.0.0.1:20000).
        #[arg(long)]
        addr: String,
    },

    /// Accept one inbound TCP connection (outstation side).
    TcpServer {
        /// Listen address (e.g. 0.0.0.0:20000).
        #[arg(long)]
        listen: String,
    },

    /// Open a serial port.
    Serial {
        /// Serial port path (e.g. /dev/ttyUSB0, COM3).
        #[arg(long)]
        port: String,

        /// Baud rate.
        #[arg(long, default_value_t = 9600)]
        baud: u32,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a hex payload like "05 64 05 c0" or "056405c0" into bytes.
fn parse_hex_payload(s: &str) -> Result<Bytes> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact.len() % 2 != 0 {
        bail!("hex payload must contain an even, nonzero number of digits");
    }
    let mut bytes = Vec::with_capacity(compact.len() / 2);
    for pair in compact.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(pair).context("payload is not valid UTF-8")?;
        let byte = u8::from_str_radix(pair, 16)
            .with_context(|| format!("invalid hex byte '{pair}'"))?;
        bytes.push(byte);
    }
    Ok(Bytes::from(bytes))
}

/// Format bytes as space-separated lowercase hex.
fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Upper layer
// ---------------------------------------------------------------------------

/// Notifications forwarded from the channel task to the main loop.
#[derive(Debug)]
enum Notification {
    LayerUp,
    LayerDown,
    OpenFailure,
    Receive(Vec<u8>),
    SendResult(bool),
}

/// An upper layer that forwards every notification over an mpsc channel,
/// so the main loop can react while holding the channel handle.
struct ForwardingUpper {
    tx: mpsc::UnboundedSender<Notification>,
}

impl UpperLayer for ForwardingUpper {
    fn on_layer_up(&mut self) {
        let _ = self.tx.send(Notification::LayerUp);
    }

    fn on_layer_down(&mut self) {
        let _ = self.tx.send(Notification::LayerDown);
    }

    fn on_open_failure(&mut self) {
        let _ = self.tx.send(Notification::OpenFailure);
    }

    fn on_receive(&mut self, buf: BytesMut) {
        let _ = self.tx.send(Notification::Receive(buf.to_vec()));
    }

    fn on_send_result(&mut self, success: bool) {
        let _ = self.tx.send(Notification::SendResult(success));
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

/// Drive one channel: open it, keep a read armed, write the payload when the
/// link comes up, and close cleanly on Ctrl-C or when the duration elapses.
async fn run_channel(
    handle: ChannelHandle,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    payload: Option<Bytes>,
    duration_secs: u64,
    mut retries: u32,
) -> Result<()> {
    handle.open()?;

    let deadline = if duration_secs > 0 {
        Some(tokio::time::Instant::now() + Duration::from_secs(duration_secs))
    } else {
        None
    };

    let mut frames: u64 = 0;
    let mut closing = false;

    loop {
        let sleep_until = deadline
            .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            notification = notifications.recv() => {
                let Some(notification) = notification else {
                    bail!("channel task stopped unexpectedly");
                };
                match notification {
                    Notification::LayerUp => {
                        println!("link up");
                        handle.read(BytesMut::with_capacity(READ_CAPACITY))?;
                        if let Some(data) = &payload {
                            println!("tx {} bytes: {}", data.len(), format_hex(data));
                            handle.write(data.clone())?;
                        }
                    }
                    Notification::LayerDown => {
                        println!("link down ({frames} frames received)");
                        return Ok(());
                    }
                    Notification::OpenFailure => {
                        if closing {
                            println!("open canceled");
                            return Ok(());
                        }
                        if retries == 0 {
                            bail!("open failed and no retries remain");
                        }
                        retries -= 1;
                        println!("open failed, retrying ({retries} attempts left)...");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        handle.open()?;
                    }
                    Notification::Receive(data) => {
                        frames += 1;
                        println!("rx {} bytes: {}", data.len(), format_hex(&data));
                        if !closing {
                            handle.read(BytesMut::with_capacity(READ_CAPACITY))?;
                        }
                    }
                    Notification::SendResult(success) => {
                        if success {
                            println!("tx complete");
                        } else {
                            println!("tx failed");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c(), if !closing => {
                println!("closing...");
                closing = true;
                handle.close()?;
            }
            _ = tokio::time::sleep_until(sleep_until), if deadline.is_some() && !closing => {
                println!("duration elapsed, closing...");
                closing = true;
                handle.close()?;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let payload = cli
        .send
        .as_deref()
        .map(parse_hex_payload)
        .transpose()
        .context("invalid --send payload")?;

    let (tx, notifications) = mpsc::unbounded_channel();
    let upper = ForwardingUpper { tx };

    let mut manager = Manager::new();
    let handle = match &cli.command {
        Command::TcpClient { addr } => {
            info!(%addr, "opening TCP client channel");
            manager.add_tcp_client(addr.clone(), upper)
        }
        Command::TcpServer { listen } => {
            info!(%listen, "opening TCP server channel");
            manager.add_tcp_server(listen.clone(), upper)
        }
        Command::Serial { port, baud } => {
            info!(%port, baud, "opening serial channel");
            let config = SerialConfig {
                baud_rate: *baud,
                ..SerialConfig::default()
            };
            manager.add_serial(port.clone(), config, upper)
        }
    };

    let result = run_channel(handle, notifications, payload, cli.duration, cli.retries).await;
    manager.shutdown().await;
    result
}
