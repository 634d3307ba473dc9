//! # Kiln Echo Client
//!
//! Connects to an echo server, sends framed messages and prints the frames
//! that come back.
//!
//! ## Usage
//!
//! ```bash
//! echo_client --host 127.0.0.1 --port 7777 --count 5 --message "hello"
//! ```

use std::time::{Duration, Instant};

use kiln_networking::protocol::{split_frame, WireReader, WireWriter};
use kiln_networking::{
    net_init, net_shutdown, Client, ClientConfig, ClientHandler, ClientState, NetConfig, NetError,
    NetResult, Outbox, Packet, PacketType, TickPacer, MAX_FRAME_SIZE,
};
use tracing_subscriber::EnvFilter;

const GREETING: PacketType = PacketType(1);

/// Encodes one greeting frame: sequence number plus text.
fn greeting(sequence: u32, text: &str) -> Option<Vec<u8>> {
    let mut payload = [0u8; MAX_FRAME_SIZE];
    let mut writer = WireWriter::new(&mut payload);
    if !(writer.write_u32(sequence) && writer.write_string(text)) {
        return None;
    }
    Packet::with_payload(GREETING, writer.as_slice()).to_bytes().ok()
}

#[derive(Default)]
struct EchoClient {
    finished: bool,
    replies: usize,
    error: Option<NetError>,
}

impl ClientHandler for EchoClient {
    fn on_connected(&mut self, _outbox: &mut Outbox<'_>) {
        println!("Connected");
    }

    fn on_disconnected(&mut self, reason: NetResult<()>) {
        println!("Disconnected ({reason:?})");
        self.finished = true;
    }

    fn on_data_received(&mut self, data: &[u8], _outbox: &mut Outbox<'_>) -> usize {
        let mut consumed = 0;
        loop {
            match split_frame(&data[consumed..]) {
                Ok(Some((packet, used))) => {
                    let mut reader = WireReader::new(packet.payload());
                    match (reader.read_u32(), reader.read_string(256)) {
                        (Some(sequence), Some(text)) => println!("Echo #{sequence}: {text}"),
                        _ => println!("Echo of {} bytes (type {})", packet.payload().len(), packet.packet_type().0),
                    }
                    self.replies += 1;
                    consumed += used;
                }
                Ok(None) => return consumed,
                Err(err) => {
                    eprintln!("Bad frame from server: {err}");
                    return data.len();
                }
            }
        }
    }

    fn on_error(&mut self, error: NetError) {
        eprintln!("Client error: {error}");
        self.error = Some(error);
    }
}

fn main() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();
    let mut host = "127.0.0.1".to_owned();
    let mut port = kiln_networking::DEFAULT_PORT;
    let mut count = 3u32;
    let mut message = "hello from kiln".to_owned();
    let mut timeout_secs = 10u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    match NetConfig::load(&args[i + 1]) {
                        Ok(loaded) => config = loaded.client,
                        Err(err) => {
                            eprintln!("Failed to load {}: {err}", args[i + 1]);
                            std::process::exit(1);
                        }
                    }
                    i += 1;
                }
            }
            "--host" | "-H" => {
                if i + 1 < args.len() {
                    host.clone_from(&args[i + 1]);
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().unwrap_or(port);
                    i += 1;
                }
            }
            "--count" | "-n" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--message" | "-m" => {
                if i + 1 < args.len() {
                    message.clone_from(&args[i + 1]);
                    i += 1;
                }
            }
            "--timeout" | "-t" => {
                if i + 1 < args.len() {
                    timeout_secs = args[i + 1].parse().unwrap_or(timeout_secs);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: echo_client [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>        TOML file with a [client] section");
                println!("  -H, --host <HOST>          Server host (default: 127.0.0.1)");
                println!("  -p, --port <PORT>          Server port (default: 7777)");
                println!("  -n, --count <NUM>          Messages to send (default: 3)");
                println!("  -m, --message <TEXT>       Message text");
                println!("  -t, --timeout <SECS>       Give up after N seconds (default: 10)");
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

    let mut client = match Client::new(config, EchoClient::default()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Client setup failed: {err}");
            net_shutdown();
            std::process::exit(1);
        }
    };
    if let Err(err) = client.connect(&host, port) {
        eprintln!("Cannot connect to {host}:{port}: {err}");
        net_shutdown();
        std::process::exit(1);
    }

    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
    let mut pacer = TickPacer::new(60);
    let mut sent = 0u32;

    while !client.handler().finished {
        client.update();

        if client.state() == ClientState::Connected {
            if sent < count {
                match greeting(sent, &message) {
                    Some(frame) if client.send_data(&frame) => sent += 1,
                    Some(_) => {}
                    None => {
                        eprintln!("Message too long for one frame");
                        let _ = client.disconnect();
                    }
                }
            } else if client.handler().replies >= count as usize {
                let _ = client.disconnect();
            }
        }

        if Instant::now() >= deadline && client.state() != ClientState::Disconnected {
            eprintln!("Timed out");
            let _ = client.disconnect();
        }
        pacer.wait();
    }

    let failed = client.handler().error.is_some();
    drop(client);
    net_shutdown();
    if failed {
        std::process::exit(1);
    }
}
