//! Server event callbacks.

use super::peer::{PeerContext, PeerId};
use crate::error::{NetError, NetResult};
use crate::socket::Address;

/// Receives server events.
///
/// Every callback runs inside [`Server::update`](super::Server::update) (or
/// `start`/`stop`) on the calling thread.
pub trait ServerHandler {
    /// Per-peer application state, created with `Default` when a peer is
    /// accepted and handed back when it leaves.
    type Session: Default;

    /// The server is listening on `local`.
    fn on_started(&mut self, _local: &Address) {}

    /// The server has stopped and released every peer. Always after the last
    /// `on_client_disconnected`.
    fn on_stopped(&mut self, _reason: NetResult<()>) {}

    /// A peer was accepted.
    fn on_client_connected(&mut self, _peer: &mut PeerContext<'_, Self::Session>, _address: &Address) {}

    /// A peer is gone. This is the last callback for `peer`; its session is
    /// returned to the application.
    fn on_client_disconnected(&mut self, _peer: PeerId, _session: Self::Session, _reason: NetResult<()>) {}

    /// New bytes arrived from a peer. `data` is everything buffered and not
    /// yet consumed.
    ///
    /// Returns how many leading bytes were consumed. The default consumes
    /// everything.
    fn on_data_received(&mut self, _peer: &mut PeerContext<'_, Self::Session>, data: &[u8]) -> usize {
        data.len()
    }

    /// A fatal listener error; the server shuts down afterwards.
    fn on_error(&mut self, _error: NetError) {}
}
