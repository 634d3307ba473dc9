//! Client event callbacks.

use crate::error::{NetError, NetResult};
use crate::outbox::Outbox;

/// Receives client events.
///
/// Every callback runs inside [`Client::update`](super::Client::update) on
/// the calling thread. All methods have empty defaults.
pub trait ClientHandler {
    /// The connection is established. Bytes queued in `outbox` go out on the
    /// next pump.
    fn on_connected(&mut self, _outbox: &mut Outbox<'_>) {}

    /// The connection is gone; `Ok(())` for a local disconnect or a graceful
    /// close by the server.
    ///
    /// Always the last callback of a connection.
    fn on_disconnected(&mut self, _reason: NetResult<()>) {}

    /// New bytes arrived. `data` is everything buffered and not yet consumed.
    ///
    /// Returns how many leading bytes were consumed; the rest is offered again
    /// when more data arrives. The default consumes everything.
    fn on_data_received(&mut self, data: &[u8], _outbox: &mut Outbox<'_>) -> usize {
        data.len()
    }

    /// The connection failed; `on_disconnected` follows in the same update.
    fn on_error(&mut self, _error: NetError) {}
}
