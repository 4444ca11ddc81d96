//! Reliable file-transfer server.
//!
//! Single-threaded accept loop: read a datagram, decode it, hand
//! `(packet, peer_addr)` to the [`Dispatcher`]. All session state lives on
//! the loop thread — no locking, per §5 of the design (single-threaded,
//! event-driven core).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use filexfer_common::{Protocol, DEFAULT_PORT, LOCALHOST, RETRANSMIT_TIMEOUT_MS, SERVER_STORAGE};
use filexfer_transport::dispatcher::Dispatcher;
use filexfer_transport::socket::UdpSocketTransport;
use filexfer_transport::store::FsStore;

/// Reliable file-transfer server (Stop-and-Wait / Selective-Repeat over UDP).
#[derive(Parser, Debug)]
#[command(name = "filexfer-server", about = "Reliable file-transfer server over UDP")]
struct Cli {
    /// Address to bind the UDP socket to.
    #[arg(short = 'H', long, default_value = LOCALHOST)]
    host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory serving uploaded/downloadable files.
    #[arg(short, long, default_value = SERVER_STORAGE)]
    storage: PathBuf,

    /// Error-recovery protocol this server speaks with every client.
    #[arg(short = 'r', long, default_value = "stop-wait")]
    protocol: Protocol,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Suppress all but warning/error logs.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
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

    std::fs::create_dir_all(&cli.storage)?;

    let bind_addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let transport = UdpSocketTransport::bind(bind_addr)?;
    transport.set_read_timeout(Some(Duration::from_millis(RETRANSMIT_TIMEOUT_MS)))?;

    tracing::info!(
        addr = %bind_addr,
        storage = %cli.storage.display(),
        protocol = %cli.protocol,
        "filexfer-server starting"
    );

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            tracing::info!("shutting down...");
            running.store(false, Ordering::Relaxed);
        })?;
    }

    let store = FsStore::new(cli.storage);
    let mut dispatcher = Dispatcher::new(transport, store, cli.protocol);

    while running.load(Ordering::Relaxed) {
        match dispatcher.transport().recv_from() {
            Ok((packet, from)) => dispatcher.handle_request(packet, from),
            Err(err) if err.is_retriable_timeout() => continue,
            Err(err) => {
                tracing::error!(error = %err, "socket read error");
            }
        }
    }

    tracing::info!(sessions_open = dispatcher.session_count(), "filexfer-server stopped");
    Ok(())
}
