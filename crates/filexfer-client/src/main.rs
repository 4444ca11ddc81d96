//! Upload/download CLI client for the reliable file-transfer service.
//!
//! A minimal peer of the server's own state machine: it drives the same
//! wire codec and reuses the transport crate's window/reorder building
//! blocks, just with a single hardcoded peer (the server) instead of a
//! session table keyed by many peers.

use std::fs::File;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filexfer_common::{
    Operation, Protocol, CLIENT_STORAGE, LOCALHOST, MAX_PAYLOAD, MAX_RETRIES, RETRANSMIT_TIMEOUT_MS,
};
use filexfer_transport::reorder::ReorderBuffer;
use filexfer_transport::socket::UdpSocketTransport;
use filexfer_transport::sr_engine::{ResendOutcome, SrEngine};
use filexfer_transport::wire::{self, PacketBody, PacketKind};

/// Reliable file-transfer client (Stop-and-Wait / Selective-Repeat over UDP).
#[derive(Parser, Debug)]
#[command(name = "filexfer-client", about = "Reliable file-transfer client over UDP")]
struct Cli {
    /// Server host to connect to.
    #[arg(short = 'H', long, default_value = LOCALHOST)]
    host: String,

    /// Server port.
    #[arg(short, long, default_value_t = filexfer_common::DEFAULT_PORT)]
    port: u16,

    /// Local directory files are read from (upload) or written to (download).
    #[arg(short, long, default_value = CLIENT_STORAGE)]
    dst: PathBuf,

    /// Remote file name.
    #[arg(short, long, default_value = "hello.txt")]
    name: String,

    /// Error-recovery protocol to use for this transfer.
    #[arg(short = 'r', long, default_value = "stop-wait")]
    protocol: Protocol,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Suppress all but warning/error logs.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a local file to the server.
    Upload,
    /// Fetch a file from the server.
    Download,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose >= 2 {
        "trace"
    } else if cli.verbose == 1 {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .compact()
        .init();

    std::fs::create_dir_all(&cli.dst)?;

    let server_addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let transport = UdpSocketTransport::bind("0.0.0.0:0".parse().unwrap())?;
    transport.connect(server_addr)?;
    transport.set_read_timeout(Some(Duration::from_millis(RETRANSMIT_TIMEOUT_MS)))?;

    tracing::info!(
        server = %server_addr,
        protocol = %cli.protocol,
        file = %cli.name,
        command = ?cli.command,
        "filexfer-client starting"
    );

    match cli.command {
        Command::Upload => upload(&transport, server_addr, cli.protocol, &cli.dst.join(&cli.name), &cli.name),
        Command::Download => {
            download(&transport, server_addr, cli.protocol, &cli.dst.join(&cli.name), &cli.name)
        }
    }
}

/// Resend `datagram` on every read timeout, up to `MAX_RETRIES` times, until
/// a packet is received. Used for every request this client cannot simply
/// fire-and-forget (everything except the final `Fin` acknowledgment).
fn send_until_reply(
    transport: &UdpSocketTransport,
    server_addr: SocketAddr,
    datagram: &[u8],
) -> anyhow::Result<wire::DecodedPacket> {
    transport.send_to(datagram, server_addr)?;
    for attempt in 0..=MAX_RETRIES {
        match transport.recv_from() {
            Ok((packet, _from)) => return Ok(packet),
            Err(err) if err.is_retriable_timeout() => {
                tracing::debug!(attempt, "timed out waiting for reply; retransmitting");
                transport.send_to(datagram, server_addr)?;
            }
            Err(err) => return Err(err.into()),
        }
    }
    anyhow::bail!("no reply after {} retransmissions", MAX_RETRIES);
}

fn upload(
    transport: &UdpSocketTransport,
    server_addr: SocketAddr,
    protocol: Protocol,
    local_path: &std::path::Path,
    remote_name: &str,
) -> anyhow::Result<()> {
    let mut file = File::open(local_path)?;

    let init = wire::encode_init(0, Operation::Upload, remote_name);
    let reply = send_until_reply(transport, server_addr, &init)?;
    anyhow::ensure!(reply.kind == PacketKind::Ack, "unexpected reply to Init: {:?}", reply.kind);

    // Unlike the server's download-send engine, there is no Init/Ack(0)
    // handshake to account for on this side — the first Data chunk is
    // sequence 0 (see S1/S2).
    let mut engine = SrEngine::new_at(protocol, 0);
    let window = engine.window_capacity();
    let mut eof = false;
    let mut buf = vec![0u8; MAX_PAYLOAD];

    // Prime the window.
    for _ in 0..window {
        if eof {
            break;
        }
        let n = file.read(&mut buf)?;
        if n == 0 {
            eof = true;
            break;
        }
        send_data_chunk(transport, server_addr, &mut engine, &buf[..n])?;
    }

    loop {
        if engine.is_empty() && eof {
            break;
        }
        let reply = match transport.recv_from() {
            Ok((packet, _from)) => packet,
            Err(err) if err.is_retriable_timeout() => continue,
            Err(err) => return Err(err.into()),
        };

        match reply.kind {
            PacketKind::Ack if reply.valid => {
                if engine.ack_received(reply.sequence) && !eof {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        eof = true;
                    } else {
                        send_data_chunk(transport, server_addr, &mut engine, &buf[..n])?;
                    }
                }
            }
            PacketKind::Nack => match engine.resend_package(reply.sequence) {
                ResendOutcome::Retransmit(payload) => {
                    transport.send_to(&wire::encode_data(reply.sequence, &payload), server_addr)?;
                }
                ResendOutcome::RetryBudgetExhausted => {
                    anyhow::bail!("retry budget exhausted for sequence {}", reply.sequence);
                }
                ResendOutcome::OutOfWindow => {}
            },
            other => {
                tracing::warn!(?other, "unexpected reply during upload");
            }
        }
    }

    let fin = wire::encode_fin(0);
    let _ = send_until_reply(transport, server_addr, &fin)?;
    tracing::info!(file = remote_name, "upload complete");
    Ok(())
}

fn send_data_chunk(
    transport: &UdpSocketTransport,
    server_addr: SocketAddr,
    engine: &mut SrEngine,
    chunk: &[u8],
) -> anyhow::Result<()> {
    let (sequence, payload) = engine.send_chunk(chunk.to_vec());
    transport.send_to(&wire::encode_data(sequence, &payload), server_addr)?;
    Ok(())
}

fn download(
    transport: &UdpSocketTransport,
    server_addr: SocketAddr,
    protocol: Protocol,
    local_path: &std::path::Path,
    remote_name: &str,
) -> anyhow::Result<()> {
    let init = wire::encode_init(0, Operation::Download, remote_name);
    let first = send_until_reply(transport, server_addr, &init)?;
    if first.kind == PacketKind::Fin {
        anyhow::bail!("server does not have file {remote_name:?}");
    }
    anyhow::ensure!(first.kind == PacketKind::Ack, "unexpected reply to Init: {:?}", first.kind);

    let mut out = File::create(local_path)?;
    let mut expected_seq = protocol.next_seq(0);
    let mut reorder = ReorderBuffer::new();

    // Ack the Init response to kick off the server's download-send path.
    let ack0 = wire::encode_ack(0);
    transport.send_to(&ack0, server_addr)?;

    loop {
        let reply = match transport.recv_from() {
            Ok((packet, _from)) => packet,
            Err(err) if err.is_retriable_timeout() => {
                transport.send_to(&ack0, server_addr)?;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match reply.kind {
            PacketKind::Fin => {
                transport.send_to(&wire::encode_ack(0), server_addr)?;
                break;
            }
            PacketKind::Data => {
                if !reply.valid {
                    transport.send_to(&wire::encode_nack(reply.sequence), server_addr)?;
                    continue;
                }
                let PacketBody::Data { payload } = reply.body else {
                    continue;
                };
                if reply.sequence == expected_seq {
                    out.write_all(&payload)?;
                    expected_seq = protocol.next_seq(expected_seq);
                    let drained = reorder.drain_contiguous(expected_seq, |seq| protocol.next_seq(seq));
                    if let Some((last_seq, _)) = drained.last() {
                        expected_seq = protocol.next_seq(*last_seq);
                    }
                    for (_, bytes) in &drained {
                        out.write_all(bytes)?;
                    }
                } else {
                    reorder.insert(reply.sequence, payload.to_vec());
                }
                transport.send_to(&wire::encode_ack(reply.sequence), server_addr)?;
            }
            other => {
                tracing::warn!(?other, "unexpected reply during download");
            }
        }
    }

    tracing::info!(file = remote_name, "download complete");
    Ok(())
}
