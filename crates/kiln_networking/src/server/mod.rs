//! # Network Server
//!
//! A TCP listener plus a capped list of peers, driven one tick at a time.
//!
//! ## State Machine
//!
//! ```text
//! Stopped ──start()──▶ Starting ──bind/listen ok──▶ Running
//!    ▲                    │                            │
//!    │                  fail                   stop() / fatal accept
//!    │                    ▼                            ▼
//!    └──────────────── Stopped ◀── all peers gone ── ShuttingDown
//! ```
//!
//! ## Per-tick Work
//!
//! 1. Accept every pending connection while `Running`; connections over the
//!    peer cap are closed without a callback
//! 2. Walk the peers newest first: reap finished ones, flush outbound bytes,
//!    read and deliver inbound bytes
//! 3. Finish a shutdown once no peers remain
//!
//! A peer is only removed in step 2, so `on_client_disconnected` for every
//! peer always precedes `on_stopped`.

mod config;
mod handler;
mod peer;

pub use config::ServerConfig;
pub use handler::ServerHandler;
pub use peer::{PeerContext, PeerId};

use kiln_core::ByteBuffer;

use crate::error::{NetError, NetResult};
use crate::socket::{Address, Socket, SocketKind};
use peer::Peer;

/// Server state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServerState {
    /// Not listening; `start` may be called.
    #[default]
    Stopped,
    /// Opening the listener.
    Starting,
    /// Accepting and serving peers.
    Running,
    /// Listener closed, waiting for peers to be released.
    ShuttingDown,
    /// The listener failed; shutdown follows in the same update.
    Error,
}

/// Non-blocking TCP server.
pub struct Server<H: ServerHandler> {
    config: ServerConfig,
    handler: H,
    state: ServerState,
    listener: Option<Socket>,
    local: Option<Address>,
    peers: Vec<Peer<H::Session>>,
    /// Next ID to hand out; 0 once the space is exhausted.
    next_id: u32,
    /// Reported to `on_stopped`; also carries the error in `Error`.
    reason: NetResult<()>,
}

impl<H: ServerHandler> Server<H> {
    /// Creates a stopped server.
    #[must_use]
    pub fn new(config: ServerConfig, handler: H) -> Self {
        Self {
            config,
            handler,
            state: ServerState::Stopped,
            listener: None,
            local: None,
            peers: Vec::new(),
            next_id: 1,
            reason: Ok(()),
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the event handler.
    #[inline]
    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the event handler mutably.
    #[inline]
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Returns the address actually listened on (with the OS-chosen port
    /// when configured with port 0).
    #[inline]
    #[must_use]
    pub const fn local_address(&self) -> Option<&Address> {
        self.local.as_ref()
    }

    /// Returns the number of peer records, including ones awaiting removal.
    #[inline]
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Returns the IDs of all peer records, oldest first.
    pub fn peer_ids(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.iter().map(|peer| peer.id)
    }

    /// Returns a peer's remote address.
    #[must_use]
    pub fn peer_address(&self, id: PeerId) -> Option<&Address> {
        self.find(id).map(|peer| &peer.address)
    }

    /// Returns a peer's session.
    #[must_use]
    pub fn session(&self, id: PeerId) -> Option<&H::Session> {
        self.find(id).map(|peer| &peer.session)
    }

    /// Returns a peer's session mutably.
    pub fn session_mut(&mut self, id: PeerId) -> Option<&mut H::Session> {
        self.find_mut(id).map(|peer| &mut peer.session)
    }

    /// Opens the listener and starts accepting.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidState`] unless stopped
    /// - [`NetError::InvalidArgument`] for an invalid configuration
    /// - any socket error from create/bind/listen; the server stays stopped
    pub fn start(&mut self) -> NetResult<()> {
        if self.state != ServerState::Stopped {
            return Err(NetError::InvalidState);
        }
        if let Err(err) = self.config.validate() {
            tracing::error!("Refusing to start: {}", err);
            return Err(NetError::InvalidArgument);
        }

        self.set_state(ServerState::Starting);
        let listener = match self.open_listener() {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(
                    "Failed to listen on {}:{}: {}",
                    self.config.bind_address,
                    self.config.port,
                    err
                );
                self.set_state(ServerState::Stopped);
                return Err(err);
            }
        };

        let local = listener
            .local_address()
            .cloned()
            .unwrap_or_else(|| Address::new(self.config.bind_address, self.config.port));
        tracing::info!("Server listening on {} (max {} clients)", local, self.config.max_clients);

        self.listener = Some(listener);
        self.reason = Ok(());
        self.set_state(ServerState::Running);
        self.handler.on_started(&local);
        self.local = Some(local);
        Ok(())
    }

    fn open_listener(&self) -> NetResult<Socket> {
        let addr = Address::new(self.config.bind_address, self.config.port);
        let mut socket = Socket::create_with_family(SocketKind::Tcp, addr.family(), false)?;
        if self.config.reuse_address {
            socket.set_reuse_address(true)?;
        }
        socket.bind(&addr)?;
        socket.listen(self.config.backlog)?;
        Ok(socket)
    }

    /// Stops accepting and disconnects every peer.
    ///
    /// Peers are released on the next update, each with
    /// `on_client_disconnected(.., Ok(()))`, followed by `on_stopped`. With
    /// no peers, `on_stopped` fires before this returns.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidState`] unless running.
    pub fn stop(&mut self) -> NetResult<()> {
        if self.state != ServerState::Running {
            return Err(NetError::InvalidState);
        }
        tracing::info!("Stopping server ({} peers)", self.peers.len());
        self.shut_down(Ok(()));
        Ok(())
    }

    /// Queues `data` for a peer.
    ///
    /// Returns false, queueing nothing, when the peer is unknown or being
    /// disconnected, or its outbound buffer lacks room.
    pub fn send_data(&mut self, id: PeerId, data: &[u8]) -> bool {
        match self.find_mut(id) {
            Some(peer) if !peer.pending_disconnect => peer.outbound.write(data),
            _ => false,
        }
    }

    /// Disconnects a peer on the next update, with reason `Ok(())`.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidArgument`] for an unknown peer.
    pub fn disconnect_client(&mut self, id: PeerId) -> NetResult<()> {
        let peer = self.find_mut(id).ok_or(NetError::InvalidArgument)?;
        peer.mark_disconnect(Ok(()));
        Ok(())
    }

    /// Advances the server by one tick.
    pub fn update(&mut self) {
        if self.state == ServerState::Running {
            self.accept_pending();
        }
        if self.state == ServerState::Error {
            let error = self.reason.err().unwrap_or(NetError::UnknownError);
            self.handler.on_error(error);
            self.shut_down(Err(error));
        }

        self.service_peers();

        if self.state == ServerState::ShuttingDown && self.peers.is_empty() {
            self.finish_stop();
        }
    }

    fn set_state(&mut self, state: ServerState) {
        if self.state != state {
            tracing::debug!("Server state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn shut_down(&mut self, reason: NetResult<()>) {
        self.listener = None;
        self.reason = reason;
        self.set_state(ServerState::ShuttingDown);
        for peer in &mut self.peers {
            peer.mark_disconnect(Ok(()));
        }
        if self.peers.is_empty() {
            self.finish_stop();
        }
    }

    fn finish_stop(&mut self) {
        self.local = None;
        self.set_state(ServerState::Stopped);
        let reason = std::mem::replace(&mut self.reason, Ok(()));
        tracing::info!("Server stopped ({:?})", reason);
        self.handler.on_stopped(reason);
    }

    fn find(&self, id: PeerId) -> Option<&Peer<H::Session>> {
        self.peers.iter().find(|peer| peer.id == id)
    }

    fn find_mut(&mut self, id: PeerId) -> Option<&mut Peer<H::Session>> {
        self.peers.iter_mut().find(|peer| peer.id == id)
    }

    fn next_peer_id(&mut self) -> Option<PeerId> {
        let id = self.next_id;
        if id == 0 {
            return None;
        }
        self.next_id = id.checked_add(1).unwrap_or(0);
        Some(PeerId(id))
    }

    fn allocate_buffers(&self) -> NetResult<(ByteBuffer, ByteBuffer)> {
        Ok((
            ByteBuffer::with_capacity(self.config.send_buffer_size)?,
            ByteBuffer::with_capacity(self.config.recv_buffer_size)?,
        ))
    }

    fn accept_pending(&mut self) {
        loop {
            let Some(listener) = self.listener.as_mut() else {
                return;
            };
            let (mut socket, address) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(error) if error.is_transient() => return,
                Err(error @ (NetError::AcceptFailed | NetError::OutOfMemory)) => {
                    tracing::warn!("Accept failed: {}", error);
                    return;
                }
                Err(error) => {
                    tracing::error!("Listener failed: {}", error);
                    self.reason = Err(error);
                    self.set_state(ServerState::Error);
                    return;
                }
            };

            if self.peers.len() >= self.config.max_clients {
                tracing::warn!(
                    "Rejecting {}: server full ({} clients)",
                    address,
                    self.config.max_clients
                );
                continue;
            }

            if self.config.nodelay {
                if let Err(error) = socket.set_nodelay(true) {
                    tracing::debug!("TCP_NODELAY on {} failed: {}", address, error);
                }
            }

            let (outbound, inbound) = match self.allocate_buffers() {
                Ok(buffers) => buffers,
                Err(error) => {
                    tracing::warn!("Dropping {}: {}", address, error);
                    continue;
                }
            };
            let Some(id) = self.next_peer_id() else {
                tracing::warn!("Dropping {}: peer IDs exhausted", address);
                continue;
            };

            tracing::info!("Client connected: {} ({})", address, id);
            let mut peer = Peer::new(id, socket, address.clone(), outbound, inbound, H::Session::default());
            let (_, mut context) = peer.context();
            self.handler.on_client_connected(&mut context, &address);
            self.peers.push(peer);
        }
    }

    fn service_peers(&mut self) {
        for index in (0..self.peers.len()).rev() {
            if self.peers[index].is_finished() {
                let peer = self.peers.remove(index);
                self.release(peer);
                continue;
            }
            service_peer(&mut self.handler, &mut self.peers[index]);
        }
    }

    fn release(&mut self, peer: Peer<H::Session>) {
        let Peer {
            id,
            socket,
            address,
            outbound,
            session,
            reason,
            ..
        } = peer;

        if let Some(mut socket) = socket {
            socket.flush_before_close(outbound.readable());
        }

        tracing::info!("Client disconnected: {} ({}, {:?})", address, id, reason);
        self.handler.on_client_disconnected(id, session, reason);
    }
}

/// Flushes and reads one live peer, delivering new bytes to `handler`.
fn service_peer<H: ServerHandler>(handler: &mut H, peer: &mut Peer<H::Session>) {
    let Some(socket) = peer.socket.as_mut() else {
        return;
    };
    while !peer.outbound.is_empty() {
        match socket.send(peer.outbound.readable()) {
            Ok(0) => break,
            Ok(sent) => {
                peer.outbound.consume(sent);
            }
            Err(error) if error.is_transient() => break,
            Err(error) => {
                peer.mark_disconnect(Err(error));
                return;
            }
        }
    }

    loop {
        let Some(socket) = peer.socket.as_mut() else {
            return;
        };
        let received = match socket.recv(peer.inbound.writable()) {
            Ok(0) => {
                tracing::debug!("{} closed the connection", peer.id);
                peer.mark_disconnect(Ok(()));
                return;
            }
            Ok(received) => received,
            Err(error) if error.is_transient() => return,
            Err(error) => {
                peer.mark_disconnect(Err(error));
                return;
            }
        };
        peer.inbound.commit(received);

        let (data, mut context) = peer.context();
        let consumed = handler.on_data_received(&mut context, data);
        peer.inbound.consume(consumed);

        if peer.pending_disconnect {
            return;
        }
        if peer.inbound.is_full() {
            tracing::warn!(
                "{}: receive buffer full ({} bytes) and nothing consumed",
                peer.id,
                peer.inbound.capacity()
            );
            peer.mark_disconnect(Err(NetError::RecvFailed));
            return;
        }
    }
}

impl<H: ServerHandler> Drop for Server<H> {
    fn drop(&mut self) {
        if !self.peers.is_empty() || self.listener.is_some() {
            tracing::debug!("Dropping server with {} peers in state {:?}", self.peers.len(), self.state);
        }
    }
}
