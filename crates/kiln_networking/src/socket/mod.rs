//! # Socket Layer
//!
//! Cross-platform TCP/UDP socket facade.
//!
//! ## Design
//!
//! - One [`Socket`] type, tagged by [`SocketKind`]; operations that only make
//!   sense for one kind validate it and fail with
//!   [`NetError::InvalidArgument`]
//! - Every failure is a [`NetError`]; `WouldBlock`/`NoData` are normal answers
//!   in non-blocking mode
//! - A zero-byte TCP receive is a graceful close: it returns `Ok(0)` and the
//!   socket stops reporting itself as connected
//!
//! ## State Flags
//!
//! ```text
//! UDP:  unbound ──bind──▶ bound
//! TCP:  unbound ──bind──▶ bound ──listen──▶ listening ──accept──▶ (new, connected)
//!          └──────────connect / check_connect──────────▶ connected
//! ```

mod address;
mod os_error;

pub use address::{resolve_into, Address, Family, Resolver, SystemResolver};

use std::fmt;
use std::io::Read;
use std::net::UdpSocket;

use socket2::{Domain, Protocol, SockRef, Type};

use crate::error::{NetError, NetResult};
use crate::system::ensure_initialized;
use os_error::{map_io_error, Op};

/// Transport protocol of a socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketKind {
    /// Stream socket.
    Tcp,
    /// Datagram socket.
    Udp,
}

/// The OS handle, tagged by protocol.
enum Handle {
    Tcp(socket2::Socket),
    Udp(UdpSocket),
}

impl Handle {
    /// Borrowed view for option setting and address queries.
    fn sock_ref(&self) -> SockRef<'_> {
        match self {
            Self::Tcp(socket) => SockRef::from(socket),
            Self::Udp(socket) => SockRef::from(socket),
        }
    }
}

/// An owned OS socket.
///
/// Dropping the socket closes the OS handle.
pub struct Socket {
    handle: Handle,
    blocking: bool,
    bound: bool,
    listening: bool,
    connected: bool,
    /// Set once bound (or accepted); meaningless before.
    local: Option<Address>,
    /// Remote endpoint of a connected TCP socket.
    remote: Option<Address>,
}

impl Socket {
    /// Creates an IPv4 socket.
    ///
    /// # Errors
    ///
    /// See [`Socket::create_with_family`].
    pub fn create(kind: SocketKind, blocking: bool) -> NetResult<Self> {
        Self::create_with_family(kind, Family::V4, blocking)
    }

    /// Creates a socket of the given family.
    ///
    /// # Errors
    ///
    /// - [`NetError::NotInitialized`] outside `net_init`/`net_shutdown`
    /// - [`NetError::SocketCreateFailed`] when the OS refuses
    /// - [`NetError::SetOptFailed`] when the blocking mode cannot be applied
    pub fn create_with_family(kind: SocketKind, family: Family, blocking: bool) -> NetResult<Self> {
        ensure_initialized()?;

        let domain = match family {
            Family::V4 => Domain::IPV4,
            Family::V6 => Domain::IPV6,
        };
        let (ty, protocol) = match kind {
            SocketKind::Tcp => (Type::STREAM, Protocol::TCP),
            SocketKind::Udp => (Type::DGRAM, Protocol::UDP),
        };

        let raw = socket2::Socket::new(domain, ty, Some(protocol)).map_err(|err| {
            tracing::warn!("Creating {:?} socket failed: {}", kind, err);
            match map_io_error(&err, Op::Create) {
                NetError::OutOfMemory => NetError::OutOfMemory,
                _ => NetError::SocketCreateFailed,
            }
        })?;

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        {
            if kind == SocketKind::Tcp {
                raw.set_nosigpipe(true).map_err(|_| NetError::SetOptFailed)?;
            }
        }

        let handle = match kind {
            SocketKind::Tcp => Handle::Tcp(raw),
            SocketKind::Udp => Handle::Udp(UdpSocket::from(raw)),
        };

        let mut socket = Self {
            handle,
            blocking: true,
            bound: false,
            listening: false,
            connected: false,
            local: None,
            remote: None,
        };
        socket.set_blocking(blocking)?;

        tracing::trace!("Created {:?}/{:?} socket (blocking: {})", kind, family, blocking);
        Ok(socket)
    }

    /// Wraps a freshly accepted connection.
    fn from_accepted(raw: socket2::Socket, remote: Address, blocking: bool) -> NetResult<Self> {
        let local = raw.local_addr().ok().and_then(|addr| Address::from_sock_addr(&addr));

        let mut socket = Self {
            handle: Handle::Tcp(raw),
            blocking: !blocking,
            bound: true,
            listening: false,
            connected: true,
            local,
            remote: Some(remote),
        };
        // Accepted sockets do not inherit O_NONBLOCK on every platform.
        socket.set_blocking(blocking)?;
        Ok(socket)
    }

    /// Returns the protocol of this socket.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> SocketKind {
        match self.handle {
            Handle::Tcp(_) => SocketKind::Tcp,
            Handle::Udp(_) => SocketKind::Udp,
        }
    }

    /// Returns true in blocking mode.
    #[inline]
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Returns true once bound to a local address.
    #[inline]
    #[must_use]
    pub const fn is_bound(&self) -> bool {
        self.bound
    }

    /// Returns true for a TCP socket accepting connections.
    #[inline]
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// Returns true for a TCP socket with a live connection.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Returns the bound local address.
    #[inline]
    #[must_use]
    pub const fn local_address(&self) -> Option<&Address> {
        self.local.as_ref()
    }

    /// Returns the remote address; only a connected TCP socket has one.
    #[inline]
    #[must_use]
    pub fn remote_address(&self) -> Option<&Address> {
        if self.connected {
            self.remote.as_ref()
        } else {
            None
        }
    }

    /// Binds to `addr` and records the effective local address.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidState`] if already bound
    /// - [`NetError::BindFailed`] (address in use, permission, unavailable)
    pub fn bind(&mut self, addr: &Address) -> NetResult<()> {
        ensure_initialized()?;
        if self.bound {
            return Err(NetError::InvalidState);
        }

        let sock = self.handle.sock_ref();
        sock.bind(&addr.to_sock_addr()).map_err(|err| {
            tracing::warn!("Binding {} failed: {}", addr, err);
            match map_io_error(&err, Op::Bind) {
                NetError::InvalidArgument => NetError::InvalidArgument,
                _ => NetError::BindFailed,
            }
        })?;

        // Port 0 asks the OS to choose; record what it chose.
        let local = sock
            .local_addr()
            .ok()
            .and_then(|raw| Address::from_sock_addr(&raw))
            .unwrap_or_else(|| addr.clone());

        tracing::debug!("Bound {:?} socket to {}", self.kind(), local);
        self.bound = true;
        self.local = Some(local);
        Ok(())
    }

    /// Starts accepting connections.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidArgument`] on a UDP socket
    /// - [`NetError::InvalidState`] when unbound
    /// - [`NetError::ListenFailed`] when the OS refuses
    pub fn listen(&mut self, backlog: i32) -> NetResult<()> {
        ensure_initialized()?;
        let Handle::Tcp(raw) = &self.handle else {
            return Err(NetError::InvalidArgument);
        };
        if !self.bound {
            return Err(NetError::InvalidState);
        }

        raw.listen(backlog).map_err(|err| {
            tracing::warn!("Listen failed: {} ({:?})", err, map_io_error(&err, Op::Listen));
            NetError::ListenFailed
        })?;

        self.listening = true;
        Ok(())
    }

    /// Accepts one pending connection.
    ///
    /// The new socket uses this socket's blocking mode and is connected.
    ///
    /// # Errors
    ///
    /// - [`NetError::WouldBlock`] when nothing is pending (non-blocking)
    /// - [`NetError::InvalidArgument`] on a UDP socket
    /// - [`NetError::InvalidState`] when not listening
    /// - [`NetError::AcceptFailed`] or a more specific kind otherwise
    pub fn accept(&mut self) -> NetResult<(Self, Address)> {
        ensure_initialized()?;
        let Handle::Tcp(raw) = &self.handle else {
            return Err(NetError::InvalidArgument);
        };
        if !self.listening {
            return Err(NetError::InvalidState);
        }

        let (conn, raw_remote) = raw.accept().map_err(|err| match map_io_error(&err, Op::Accept) {
            NetError::WouldBlock => NetError::WouldBlock,
            NetError::UnknownError => NetError::AcceptFailed,
            other => other,
        })?;

        let remote = Address::from_sock_addr(&raw_remote).ok_or(NetError::AcceptFailed)?;
        let socket = Self::from_accepted(conn, remote.clone(), self.blocking)?;
        Ok((socket, remote))
    }

    /// Starts connecting to `addr`.
    ///
    /// On a non-blocking socket this usually returns
    /// [`NetError::WouldBlock`]; poll [`check_connect`](Self::check_connect)
    /// until it settles.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidArgument`] on a UDP socket
    /// - [`NetError::InvalidState`] when listening or already connected
    /// - [`NetError::ConnectFailed`] or a more specific kind otherwise
    pub fn connect(&mut self, addr: &Address) -> NetResult<()> {
        ensure_initialized()?;
        let Handle::Tcp(raw) = &self.handle else {
            return Err(NetError::InvalidArgument);
        };
        if self.listening || self.connected {
            return Err(NetError::InvalidState);
        }

        self.remote = Some(addr.clone());
        match raw.connect(&addr.to_sock_addr()) {
            Ok(()) => {
                self.mark_connected();
                Ok(())
            }
            Err(err) => match map_io_error(&err, Op::Connect) {
                NetError::WouldBlock => Err(NetError::WouldBlock),
                kind => {
                    tracing::debug!("Connect to {} failed: {}", addr, err);
                    self.remote = None;
                    Err(match kind {
                        NetError::UnknownError | NetError::RecvFailed => NetError::ConnectFailed,
                        other => other,
                    })
                }
            },
        }
    }

    /// Polls a pending non-blocking connect.
    ///
    /// A pending `SO_ERROR` means the attempt failed; otherwise the socket is
    /// connected exactly when it has a peer name.
    ///
    /// # Errors
    ///
    /// - [`NetError::WouldBlock`] while the attempt is still in flight
    /// - [`NetError::InvalidArgument`] on a UDP socket
    /// - [`NetError::InvalidState`] when no connect was started
    /// - [`NetError::ConnectFailed`] when the OS reports failure
    pub fn check_connect(&mut self) -> NetResult<()> {
        ensure_initialized()?;
        let Handle::Tcp(raw) = &self.handle else {
            return Err(NetError::InvalidArgument);
        };
        if self.connected {
            return Ok(());
        }
        if self.remote.is_none() {
            return Err(NetError::InvalidState);
        }

        match raw.take_error() {
            Ok(Some(err)) => {
                tracing::debug!("Pending connect failed: {}", err);
                self.remote = None;
                return Err(NetError::ConnectFailed);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!("Reading SO_ERROR failed: {}", err);
                return Err(NetError::ConnectFailed);
            }
        }

        match raw.peer_addr() {
            Ok(_) => {
                self.mark_connected();
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Err(NetError::WouldBlock),
            Err(err) => {
                tracing::debug!("Pending connect failed: {}", err);
                self.remote = None;
                Err(NetError::ConnectFailed)
            }
        }
    }

    fn mark_connected(&mut self) {
        self.connected = true;
        self.bound = true;
        self.local = self
            .handle
            .sock_ref()
            .local_addr()
            .ok()
            .and_then(|raw| Address::from_sock_addr(&raw));
    }

    /// Sends as many bytes of `data` as the OS accepts.
    ///
    /// Partial sends are normal; the caller keeps the remainder.
    ///
    /// # Errors
    ///
    /// - [`NetError::WouldBlock`] when the OS buffer is full
    /// - [`NetError::InvalidState`] when not connected
    /// - [`NetError::SendFailed`] when the connection is gone
    pub fn send(&mut self, data: &[u8]) -> NetResult<usize> {
        ensure_initialized()?;
        let Handle::Tcp(raw) = &self.handle else {
            return Err(NetError::InvalidState);
        };
        if !self.connected {
            return Err(NetError::InvalidState);
        }

        match raw.send_with_flags(data, SEND_FLAGS) {
            Ok(n) => Ok(n),
            Err(err) => match map_io_error(&err, Op::Send) {
                NetError::WouldBlock => Err(NetError::WouldBlock),
                kind => {
                    tracing::debug!("Send failed: {}", err);
                    self.connected = false;
                    Err(match kind {
                        NetError::UnknownError => NetError::SendFailed,
                        other => other,
                    })
                }
            },
        }
    }

    /// Sends what the OS accepts right now, once, before the socket goes away.
    ///
    /// Returns the number of bytes of `data` that were dropped.
    pub(crate) fn flush_before_close(&mut self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let sent = if self.connected {
            self.send(data).unwrap_or(0)
        } else {
            0
        };
        let dropped = data.len() - sent;
        if dropped > 0 {
            tracing::debug!(
                "Dropped {} of {} unsent bytes closing {:?}",
                dropped,
                data.len(),
                self.remote
            );
        }
        dropped
    }

    /// Receives into `buf`.
    ///
    /// `Ok(0)` on a non-empty `buf` is a graceful close by the peer, after
    /// which [`is_connected`](Self::is_connected) is false.
    ///
    /// # Errors
    ///
    /// - [`NetError::NoData`] when nothing is available (non-blocking)
    /// - [`NetError::InvalidState`] when not connected
    /// - [`NetError::RecvFailed`] when the connection is gone
    pub fn recv(&mut self, buf: &mut [u8]) -> NetResult<usize> {
        ensure_initialized()?;
        let Handle::Tcp(raw) = &self.handle else {
            return Err(NetError::InvalidState);
        };
        if !self.connected {
            return Err(NetError::InvalidState);
        }

        let mut reader: &socket2::Socket = raw;
        match reader.read(buf) {
            Ok(0) if !buf.is_empty() => {
                tracing::debug!("Peer {:?} closed the connection", self.remote);
                self.connected = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(err) => match map_io_error(&err, Op::Recv) {
                NetError::WouldBlock => Err(NetError::NoData),
                kind => {
                    tracing::debug!("Recv failed: {}", err);
                    self.connected = false;
                    Err(match kind {
                        NetError::UnknownError => NetError::RecvFailed,
                        other => other,
                    })
                }
            },
        }
    }

    /// Sends one datagram to `addr`.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidArgument`] on a TCP socket
    /// - [`NetError::WouldBlock`] when the OS buffer is full
    /// - [`NetError::SendFailed`] otherwise
    pub fn send_to(&mut self, data: &[u8], addr: &Address) -> NetResult<usize> {
        ensure_initialized()?;
        let Handle::Udp(udp) = &self.handle else {
            return Err(NetError::InvalidArgument);
        };

        let sent = udp.send_to(data, addr.socket_addr()).map_err(|err| {
            match map_io_error(&err, Op::Send) {
                NetError::WouldBlock => NetError::WouldBlock,
                NetError::InvalidArgument => NetError::InvalidArgument,
                _ => {
                    tracing::debug!("send_to {} failed: {}", addr, err);
                    NetError::SendFailed
                }
            }
        })?;

        // The first send on an unbound socket binds it implicitly.
        if !self.bound {
            self.bound = true;
            self.local = self
                .handle
                .sock_ref()
                .local_addr()
                .ok()
                .and_then(|raw| Address::from_sock_addr(&raw));
            tracing::debug!("UDP socket implicitly bound to {:?}", self.local);
        }
        Ok(sent)
    }

    /// Receives one datagram.
    ///
    /// The returned sender address is a fresh value owned by the caller.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidArgument`] on a TCP socket
    /// - [`NetError::InvalidState`] when neither bound nor used with `send_to`
    /// - [`NetError::NoData`] when nothing is queued (non-blocking)
    /// - [`NetError::RecvFailed`] otherwise
    pub fn recv_from(&mut self, buf: &mut [u8]) -> NetResult<(usize, Address)> {
        ensure_initialized()?;
        let Handle::Udp(udp) = &self.handle else {
            return Err(NetError::InvalidArgument);
        };
        if !self.bound {
            return Err(NetError::InvalidState);
        }

        match udp.recv_from(buf) {
            Ok((n, from)) => Ok((n, Address::from(from))),
            Err(err) => match map_io_error(&err, Op::Recv) {
                NetError::WouldBlock => Err(NetError::NoData),
                _ => {
                    tracing::debug!("recv_from failed: {}", err);
                    Err(NetError::RecvFailed)
                }
            },
        }
    }

    /// Switches blocking mode. Idempotent.
    ///
    /// # Errors
    ///
    /// [`NetError::SetOptFailed`] when the OS refuses.
    pub fn set_blocking(&mut self, blocking: bool) -> NetResult<()> {
        if self.blocking == blocking {
            return Ok(());
        }
        self.handle
            .sock_ref()
            .set_nonblocking(!blocking)
            .map_err(|err| set_opt_failed(&err))?;
        self.blocking = blocking;
        Ok(())
    }

    /// Sets `SO_REUSEADDR`. Idempotent.
    ///
    /// # Errors
    ///
    /// [`NetError::SetOptFailed`] when the OS refuses.
    pub fn set_reuse_address(&mut self, reuse: bool) -> NetResult<()> {
        self.handle
            .sock_ref()
            .set_reuse_address(reuse)
            .map_err(|err| set_opt_failed(&err))
    }

    /// Sets `TCP_NODELAY`. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`NetError::InvalidArgument`] on a UDP socket
    /// - [`NetError::SetOptFailed`] when the OS refuses
    pub fn set_nodelay(&mut self, nodelay: bool) -> NetResult<()> {
        let Handle::Tcp(raw) = &self.handle else {
            return Err(NetError::InvalidArgument);
        };
        raw.set_nodelay(nodelay).map_err(|err| set_opt_failed(&err))
    }
}

fn set_opt_failed(err: &std::io::Error) -> NetError {
    tracing::warn!("Setting socket option failed: {} ({:?})", err, map_io_error(err, Op::SetOpt));
    NetError::SetOptFailed
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: i32 = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: i32 = 0;

impl fmt::Debug for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("kind", &self.kind())
            .field("blocking", &self.blocking)
            .field("listening", &self.listening)
            .field("connected", &self.connected)
            .field("local", &self.local)
            .field("remote", &self.remote_address())
            .finish()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        tracing::trace!("Closing {:?} socket {:?}", self.kind(), self.local);
    }
}
