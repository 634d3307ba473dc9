//! # Kiln Echo Server
//!
//! Listens for TCP clients and sends every received byte straight back.
//!
//! ## Usage
//!
//! ```bash
//! echo_server --port 7777 --max-clients 64 --rate 60
//! echo_server --config kiln.toml --duration 30
//! ```

use std::net::IpAddr;
use std::time::Instant;

use kiln_networking::{
    net_init, net_shutdown, Address, NetConfig, NetResult, PeerContext, PeerId, Server,
    ServerConfig, ServerHandler, TickPacer,
};
use tracing_subscriber::EnvFilter;

/// Per-connection byte counter.
#[derive(Default)]
struct EchoSession {
    echoed: u64,
}

#[derive(Default)]
struct EchoHandler {
    total_echoed: u64,
    stopped: bool,
}

impl ServerHandler for EchoHandler {
    type Session = EchoSession;

    fn on_started(&mut self, local: &Address) {
        println!("Listening on {local}");
    }

    fn on_stopped(&mut self, reason: NetResult<()>) {
        println!("Server stopped ({reason:?})");
        self.stopped = true;
    }

    fn on_client_connected(&mut self, peer: &mut PeerContext<'_, EchoSession>, address: &Address) {
        println!("[{}] connected from {}", peer.id(), address);
    }

    fn on_client_disconnected(&mut self, peer: PeerId, session: EchoSession, reason: NetResult<()>) {
        println!("[{peer}] disconnected after {} bytes ({reason:?})", session.echoed);
    }

    fn on_data_received(&mut self, peer: &mut PeerContext<'_, EchoSession>, data: &[u8]) -> usize {
        // Echo as much as fits; the rest stays buffered for the next tick.
        let take = data.len().min(peer.outbox().free());
        if take > 0 && peer.send(&data[..take]) {
            peer.session_mut().echoed += take as u64;
            self.total_echoed += take as u64;
            return take;
        }
        0
    }
}

fn main() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();
    let mut rate = 60u32;
    let mut duration_secs: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    match NetConfig::load(&args[i + 1]) {
                        Ok(loaded) => config = loaded.server,
                        Err(err) => {
                            eprintln!("Failed to load {}: {err}", args[i + 1]);
                            std::process::exit(1);
                        }
                    }
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_address = args[i + 1]
                        .parse::<IpAddr>()
                        .unwrap_or(config.bind_address);
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    config.port = args[i + 1].parse().unwrap_or(config.port);
                    i += 1;
                }
            }
            "--max-clients" | "-m" => {
                if i + 1 < args.len() {
                    config.max_clients = args[i + 1].parse().unwrap_or(config.max_clients);
                    i += 1;
                }
            }
            "--rate" | "-r" => {
                if i + 1 < args.len() {
                    rate = args[i + 1].parse().unwrap_or(rate);
                    i += 1;
                }
            }
            "--duration" | "-d" => {
                if i + 1 < args.len() {
                    duration_secs = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: echo_server [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>        TOML file with a [server] section");
                println!("  -b, --bind <IP>            Address to bind (default: 0.0.0.0)");
                println!("  -p, --port <PORT>          TCP port (default: 7777, 0 = any)");
                println!("  -m, --max-clients <NUM>    Maximum clients (default: 64)");
                println!("  -r, --rate <HZ>            Update rate (default: 60)");
                println!("  -d, --duration <SECS>      Run for N seconds then exit");
                println!("  -h, --help                 Show this help");
                return;
            }
            other => eprintln!("Ignoring unknown argument: {other}"),
        }
        i += 1;
    }

    if let Err(err) = net_init() {
        eprintln!("Network init failed: {err}");
        std::process::exit(1);
    }

    let mut server = Server::new(config, EchoHandler::default());
    if let Err(err) = server.start() {
        eprintln!("Server failed to start: {err}");
        net_shutdown();
        std::process::exit(1);
    }

    let start = Instant::now();
    let mut pacer = TickPacer::new(rate);
    let mut stopping = false;

    while !server.handler().stopped {
        server.update();

        if !stopping {
            if let Some(duration) = duration_secs {
                if start.elapsed().as_secs() >= duration {
                    stopping = true;
                    let _ = server.stop();
                }
            }
        }
        pacer.wait();
    }

    println!(
        "Echoed {} bytes in {:.1}s ({} ticks, {} late)",
        server.handler().total_echoed,
        start.elapsed().as_secs_f64(),
        pacer.tick_count(),
        pacer.late_ticks()
    );
    drop(server);
    net_shutdown();
}
