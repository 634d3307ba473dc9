//! Shared harness for the loopback tests: recording handlers and a bounded
//! tick loop.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use kiln_networking::protocol::split_frame;
use kiln_networking::{
    Address, Client, ClientConfig, ClientHandler, NetError, NetResult, Outbox, Packet,
    PeerContext, PeerId, Server, ServerConfig, ServerHandler, ServerState,
};

pub fn init() {
    let _ = kiln_networking::net_init();
}

pub fn loopback(port: u16) -> Address {
    Address::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// Ticks `step` every millisecond until it returns true; panics after 5s.
pub fn pump_until(what: &str, mut step: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !step() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Ticks `step` a fixed number of times.
pub fn pump_for(ticks: usize, mut step: impl FnMut()) {
    for _ in 0..ticks {
        step();
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    Started(u16),
    Connected(PeerId),
    Data(PeerId, Vec<u8>),
    Frame(PeerId, Packet),
    Disconnected(PeerId, NetResult<()>),
    Stopped(NetResult<()>),
    Error(NetError),
}

/// How the recording server treats inbound bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Consume and record.
    #[default]
    Record,
    /// Consume, record, and send back.
    Echo,
    /// Consume only whole frames.
    Frames,
}

#[derive(Default)]
pub struct ServerLog {
    pub mode: Mode,
    pub events: Vec<ServerEvent>,
}

impl ServerLog {
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            events: Vec::new(),
        }
    }

    pub fn connected(&self) -> Vec<PeerId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Connected(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn disconnected(&self) -> Vec<(PeerId, NetResult<()>)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Disconnected(id, reason) => Some((*id, *reason)),
                _ => None,
            })
            .collect()
    }

    /// Every byte received from `peer`, in order.
    pub fn bytes_from(&self, peer: PeerId) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Data(id, bytes) if *id == peer => Some(bytes.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    pub fn frames(&self) -> Vec<Packet> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Frame(_, packet) => Some(packet.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ServerHandler for ServerLog {
    type Session = u32;

    fn on_started(&mut self, local: &Address) {
        self.events.push(ServerEvent::Started(local.port()));
    }

    fn on_stopped(&mut self, reason: NetResult<()>) {
        self.events.push(ServerEvent::Stopped(reason));
    }

    fn on_client_connected(&mut self, peer: &mut PeerContext<'_, u32>, _address: &Address) {
        *peer.session_mut() = peer.id().0;
        self.events.push(ServerEvent::Connected(peer.id()));
    }

    fn on_client_disconnected(&mut self, peer: PeerId, session: u32, reason: NetResult<()>) {
        assert_eq!(session, peer.0, "session must come back with its peer");
        self.events.push(ServerEvent::Disconnected(peer, reason));
    }

    fn on_data_received(&mut self, peer: &mut PeerContext<'_, u32>, data: &[u8]) -> usize {
        match self.mode {
            Mode::Record => {
                self.events.push(ServerEvent::Data(peer.id(), data.to_vec()));
                data.len()
            }
            Mode::Echo => {
                self.events.push(ServerEvent::Data(peer.id(), data.to_vec()));
                assert!(peer.send(data), "echo must fit");
                data.len()
            }
            Mode::Frames => {
                let mut consumed = 0;
                while let Ok(Some((packet, used))) = split_frame(&data[consumed..]) {
                    self.events.push(ServerEvent::Frame(peer.id(), packet));
                    consumed += used;
                }
                consumed
            }
        }
    }

    fn on_error(&mut self, error: NetError) {
        self.events.push(ServerEvent::Error(error));
    }
}

#[derive(Default)]
pub struct ClientLog {
    pub connected: usize,
    pub disconnected: Vec<NetResult<()>>,
    pub errors: Vec<NetError>,
    pub received: Vec<u8>,
}

impl ClientHandler for ClientLog {
    fn on_connected(&mut self, _outbox: &mut Outbox<'_>) {
        self.connected += 1;
    }

    fn on_disconnected(&mut self, reason: NetResult<()>) {
        self.disconnected.push(reason);
    }

    fn on_data_received(&mut self, data: &[u8], _outbox: &mut Outbox<'_>) -> usize {
        self.received.extend_from_slice(data);
        data.len()
    }

    fn on_error(&mut self, error: NetError) {
        self.errors.push(error);
    }
}

/// Starts a loopback server on an OS-chosen port.
pub fn start_server(mode: Mode, max_clients: usize) -> Server<ServerLog> {
    init();
    let config = ServerConfig {
        bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_clients,
        ..ServerConfig::default()
    };
    let mut server = Server::new(config, ServerLog::with_mode(mode));
    server.start().expect("server starts");
    assert_eq!(server.state(), ServerState::Running);
    server
}

pub fn server_port(server: &Server<ServerLog>) -> u16 {
    server.local_address().expect("listening").port()
}

pub fn client() -> Client<ClientLog> {
    client_with(ClientConfig::default())
}

pub fn client_with(config: ClientConfig) -> Client<ClientLog> {
    init();
    Client::new(config, ClientLog::default()).expect("client buffers")
}
