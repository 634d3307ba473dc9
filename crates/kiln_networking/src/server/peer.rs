//! # Peer Records
//!
//! One record per accepted connection: its socket, its two buffers, and the
//! application's session value.
//!
//! ## Design
//!
//! - IDs come from a per-server counter starting at 1 and never repeat
//! - Disconnects are deferred: marking a peer only sets a flag, the record is
//!   reaped on the next update

use std::fmt;

use kiln_core::ByteBuffer;

use crate::error::NetResult;
use crate::outbox::Outbox;
use crate::socket::{Address, Socket};

/// Unique identifier for a connected peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Never assigned to a peer.
    pub const INVALID: Self = Self(0);

    /// Returns true for [`PeerId::INVALID`].
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Server-side state of one connection.
pub(crate) struct Peer<S> {
    pub(crate) id: PeerId,
    pub(crate) socket: Option<Socket>,
    pub(crate) address: Address,
    pub(crate) outbound: ByteBuffer,
    pub(crate) inbound: ByteBuffer,
    pub(crate) session: S,
    pub(crate) pending_disconnect: bool,
    /// Handed to `on_client_disconnected` when the peer is reaped.
    pub(crate) reason: NetResult<()>,
}

impl<S> Peer<S> {
    pub(crate) fn new(
        id: PeerId,
        socket: Socket,
        address: Address,
        outbound: ByteBuffer,
        inbound: ByteBuffer,
        session: S,
    ) -> Self {
        Self {
            id,
            socket: Some(socket),
            address,
            outbound,
            inbound,
            session,
            pending_disconnect: false,
            reason: Ok(()),
        }
    }

    /// Flags the peer for removal; the first reason recorded wins.
    pub(crate) fn mark_disconnect(&mut self, reason: NetResult<()>) {
        if !self.pending_disconnect {
            self.pending_disconnect = true;
            self.reason = reason;
        }
    }

    /// True when the next update should reap this peer.
    pub(crate) fn is_finished(&self) -> bool {
        self.pending_disconnect || !self.socket.as_ref().is_some_and(Socket::is_connected)
    }

    /// Borrows the parts a callback may touch.
    pub(crate) fn context(&mut self) -> (&[u8], PeerContext<'_, S>) {
        let context = PeerContext {
            id: self.id,
            address: &self.address,
            outbox: Outbox::new(&mut self.outbound),
            session: &mut self.session,
            disconnect: &mut self.pending_disconnect,
        };
        (self.inbound.readable(), context)
    }
}

/// A peer as seen from inside a server callback.
pub struct PeerContext<'a, S> {
    id: PeerId,
    address: &'a Address,
    outbox: Outbox<'a>,
    session: &'a mut S,
    disconnect: &'a mut bool,
}

impl<'a, S> PeerContext<'a, S> {
    /// Returns the peer's ID.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> PeerId {
        self.id
    }

    /// Returns the peer's remote address.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> &Address {
        self.address
    }

    /// Queues bytes for this peer. See [`Outbox::send`].
    pub fn send(&mut self, data: &[u8]) -> bool {
        self.outbox.send(data)
    }

    /// Returns the peer's outbound queue.
    pub fn outbox(&mut self) -> &mut Outbox<'a> {
        &mut self.outbox
    }

    /// Returns the application's state for this peer.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &S {
        self.session
    }

    /// Returns the application's state for this peer mutably.
    #[inline]
    pub fn session_mut(&mut self) -> &mut S {
        self.session
    }

    /// Disconnects the peer at the next update, with reason `Ok(())`.
    pub fn disconnect(&mut self) {
        *self.disconnect = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_sentinel() {
        assert!(PeerId::INVALID.is_invalid());
        assert!(PeerId::default().is_invalid());
        assert!(!PeerId(1).is_invalid());
        assert_eq!(PeerId(7).to_string(), "peer#7");
    }

    #[test]
    fn test_peer_ids_order() {
        assert!(PeerId(1) < PeerId(2));
    }
}
