//! # Network Client
//!
//! One outgoing TCP connection, driven one tick at a time.
//!
//! ## State Machine
//!
//! ```text
//!               connect()                resolve ok
//! Disconnected ─────────▶ ResolvingAddress ─────────▶ Connecting
//!      ▲                        │                        │
//!      │                   resolve fail       last candidate fails
//!      │                        ▼                        │
//!      │                      Error ◀────────────────────┤
//!      │                        │ on_error               │ connected
//!      │                        ▼                        ▼
//!      └──────────────── Disconnecting ◀────────────  Connected
//!        on_disconnected               disconnect() / peer close / I/O error
//! ```
//!
//! `Error` is transient: the update that enters it also reports the error and
//! finishes the disconnect, so a host only ever observes the other states
//! between updates.
//!
//! ## Fail-over
//!
//! Every address the resolver returns is a candidate. A candidate that
//! refuses (immediately or via `check_connect`) is dropped and the next one
//! is tried in the same update. Only when all of them fail does the client
//! report [`NetError::ConnectFailed`].

mod config;
mod handler;

pub use config::ClientConfig;
pub use handler::ClientHandler;

use kiln_core::ByteBuffer;

use crate::error::{NetError, NetResult};
use crate::outbox::Outbox;
use crate::socket::{Address, Resolver, Socket, SocketKind, SystemResolver};
use crate::system::ensure_initialized;

/// Client state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientState {
    /// Idle; `connect` may be called.
    #[default]
    Disconnected,
    /// Host name lookup pending.
    ResolvingAddress,
    /// Trying candidate addresses.
    Connecting,
    /// Connection established.
    Connected,
    /// Tearing the connection down.
    Disconnecting,
    /// A fatal error occurred.
    Error,
}

/// Non-blocking TCP client.
pub struct Client<H: ClientHandler> {
    config: ClientConfig,
    handler: H,
    resolver: Box<dyn Resolver>,
    state: ClientState,
    socket: Option<Socket>,
    outbound: ByteBuffer,
    inbound: ByteBuffer,
    host: String,
    port: u16,
    /// Resolved addresses and the index of the one being tried.
    candidates: Vec<Address>,
    candidate: usize,
    /// Reported to `on_disconnected`; also carries the error in `Error`.
    reason: NetResult<()>,
}

impl<H: ClientHandler> Client<H> {
    /// Creates a disconnected client using the system resolver.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidArgument`] for a zero buffer size
    /// - [`NetError::OutOfMemory`] when the buffers cannot be allocated
    pub fn new(config: ClientConfig, handler: H) -> NetResult<Self> {
        if config.validate().is_err() {
            return Err(NetError::InvalidArgument);
        }

        Ok(Self {
            outbound: ByteBuffer::with_capacity(config.send_buffer_size)?,
            inbound: ByteBuffer::with_capacity(config.recv_buffer_size)?,
            config,
            handler,
            resolver: Box::new(SystemResolver),
            state: ClientState::Disconnected,
            socket: None,
            host: String::new(),
            port: 0,
            candidates: Vec::new(),
            candidate: 0,
            reason: Ok(()),
        })
    }

    /// Replaces the resolver used for host lookups.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
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

    /// Consumes the client, returning its handler.
    #[must_use]
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Returns the number of queued outbound bytes.
    #[inline]
    #[must_use]
    pub fn pending_send(&self) -> usize {
        self.outbound.used()
    }

    /// Returns the server address while connected.
    #[must_use]
    pub fn remote_address(&self) -> Option<&Address> {
        self.socket.as_ref().and_then(Socket::remote_address)
    }

    /// Starts connecting to `host:port`.
    ///
    /// Nothing touches the network until the next [`update`](Self::update).
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidArgument`] for an empty host
    /// - [`NetError::InvalidState`] unless disconnected
    /// - [`NetError::NotInitialized`] outside `net_init`/`net_shutdown`
    pub fn connect(&mut self, host: &str, port: u16) -> NetResult<()> {
        ensure_initialized()?;
        if host.is_empty() {
            return Err(NetError::InvalidArgument);
        }
        if self.state != ClientState::Disconnected {
            return Err(NetError::InvalidState);
        }

        tracing::info!("Connecting to {}:{}", host, port);
        host.clone_into(&mut self.host);
        self.port = port;
        self.candidates.clear();
        self.candidate = 0;
        self.reason = Ok(());
        self.set_state(ClientState::ResolvingAddress);
        Ok(())
    }

    /// Requests a disconnect; it completes, with `on_disconnected(Ok(()))`,
    /// on the next update.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidState`] when already disconnected.
    pub fn disconnect(&mut self) -> NetResult<()> {
        match self.state {
            ClientState::Disconnected => Err(NetError::InvalidState),
            ClientState::Disconnecting => Ok(()),
            _ => {
                self.reason = Ok(());
                self.set_state(ClientState::Disconnecting);
                Ok(())
            }
        }
    }

    /// Queues `data` for sending.
    ///
    /// Allowed while connecting or connected; bytes queued while connecting
    /// go out once the connection is up. Returns false, queueing nothing,
    /// when the state does not allow it or the outbound buffer lacks room.
    pub fn send_data(&mut self, data: &[u8]) -> bool {
        if !matches!(self.state, ClientState::Connecting | ClientState::Connected) {
            return false;
        }
        self.outbound.write(data)
    }

    /// Advances the state machine by one tick.
    pub fn update(&mut self) {
        if self.state == ClientState::ResolvingAddress {
            self.resolve();
        }
        if self.state == ClientState::Connecting {
            self.advance_connect();
        }
        if self.state == ClientState::Connected {
            self.pump();
        }
        if self.state == ClientState::Error {
            let error = self.reason.err().unwrap_or(NetError::UnknownError);
            self.handler.on_error(error);
            self.set_state(ClientState::Disconnecting);
        }
        if self.state == ClientState::Disconnecting {
            self.finish_disconnect();
        }
    }

    fn set_state(&mut self, state: ClientState) {
        if self.state != state {
            tracing::debug!("Client state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn fail(&mut self, error: NetError) {
        tracing::warn!("Client error: {}", error);
        self.reason = Err(error);
        self.set_state(ClientState::Error);
    }

    fn resolve(&mut self) {
        match self.resolver.resolve(&self.host, self.port, SocketKind::Tcp) {
            Ok(candidates) if !candidates.is_empty() => {
                self.candidates = candidates;
                self.candidate = 0;
                self.set_state(ClientState::Connecting);
            }
            Ok(_) => self.fail(NetError::ResolveFailed),
            Err(error) => self.fail(error),
        }
    }

    fn advance_connect(&mut self) {
        loop {
            let Some(target) = self.candidates.get(self.candidate).cloned() else {
                tracing::warn!(
                    "All {} address(es) for {}:{} failed",
                    self.candidates.len(),
                    self.host,
                    self.port
                );
                self.fail(NetError::ConnectFailed);
                return;
            };

            let result = if let Some(socket) = self.socket.as_mut() {
                socket.check_connect()
            } else {
                self.start_connect(&target)
            };

            match result {
                Ok(()) => {
                    tracing::info!("Connected to {}", target);
                    self.set_state(ClientState::Connected);
                    let mut outbox = Outbox::new(&mut self.outbound);
                    self.handler.on_connected(&mut outbox);
                    return;
                }
                Err(NetError::WouldBlock) => return,
                Err(error) => {
                    tracing::debug!("Candidate {} failed: {}", target, error);
                    self.socket = None;
                    self.candidate += 1;
                }
            }
        }
    }

    /// Opens a socket for `target` and starts connecting; the socket is kept
    /// while the attempt is alive.
    fn start_connect(&mut self, target: &Address) -> NetResult<()> {
        let mut socket = Socket::create_with_family(SocketKind::Tcp, target.family(), false)?;
        if self.config.nodelay {
            socket.set_nodelay(true)?;
        }

        let result = socket.connect(target);
        if matches!(result, Ok(()) | Err(NetError::WouldBlock)) {
            self.socket = Some(socket);
        }
        result
    }

    fn pump(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            self.fail(NetError::InvalidState);
            return;
        };

        while !self.outbound.is_empty() {
            match socket.send(self.outbound.readable()) {
                Ok(0) => break,
                Ok(sent) => {
                    self.outbound.consume(sent);
                }
                Err(error) if error.is_transient() => break,
                Err(error) => {
                    self.fail(error);
                    return;
                }
            }
        }

        loop {
            let received = match socket.recv(self.inbound.writable()) {
                Ok(0) => {
                    tracing::info!("Server closed the connection");
                    self.reason = Ok(());
                    self.set_state(ClientState::Disconnecting);
                    return;
                }
                Ok(received) => received,
                Err(error) if error.is_transient() => return,
                Err(error) => {
                    self.fail(error);
                    return;
                }
            };
            self.inbound.commit(received);

            let mut outbox = Outbox::new(&mut self.outbound);
            let consumed = self.handler.on_data_received(self.inbound.readable(), &mut outbox);
            self.inbound.consume(consumed);

            if self.inbound.is_full() {
                tracing::warn!(
                    "Receive buffer full ({} bytes) and nothing consumed",
                    self.inbound.capacity()
                );
                self.fail(NetError::RecvFailed);
                return;
            }
        }
    }

    fn finish_disconnect(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            socket.flush_before_close(self.outbound.readable());
        }
        self.outbound.clear();
        self.inbound.clear();
        self.candidates.clear();
        self.candidate = 0;

        self.set_state(ClientState::Disconnected);
        let reason = std::mem::replace(&mut self.reason, Ok(()));
        tracing::info!("Disconnected from {}:{} ({:?})", self.host, self.port, reason);
        self.handler.on_disconnected(reason);
    }
}
