//! # Kiln Networking
//!
//! Non-blocking, callback-driven TCP client/server core for the Kiln engine.
//!
//! ## Architecture
//!
//! This crate implements the complete networking stack for Kiln:
//!
//! - **Socket**: Cross-platform TCP/UDP facade over Berkeley sockets and Winsock
//! - **Protocol**: Length-prefixed binary frames, big-endian primitives
//! - **Client**: Resolve, connect with fail-over, pump, disconnect
//! - **Server**: Listen, accept up to a cap, pump every peer, shut down
//!
//! ## Scheduling Model
//!
//! Nothing in this crate spawns a thread or parks. The host calls
//! [`Client::update`] / [`Server::update`] once per tick; those calls drive
//! the state machines, move bytes between sockets and buffers, and invoke the
//! handler callbacks on the calling thread.
//!
//! ```text
//! HOST LOOP                         CORE
//!   |                                 |
//!   |--- update() ------------------->| accept / connect / send / recv
//!   |<-- on_data_received(bytes) -----|
//!   |--- returns consumed count ----->| advance read cursor
//!   |                                 |
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use kiln_networking::{net_init, Server, ServerConfig, ServerHandler, TickPacer};
//!
//! net_init()?;
//! let mut server = Server::new(ServerConfig::default(), MyHandler::default());
//! server.start()?;
//! let mut pacer = TickPacer::new(60);
//! loop {
//!     server.update();
//!     pacer.wait();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod error;
pub mod outbox;
pub mod protocol;
pub mod server;
pub mod socket;
pub mod system;
pub mod tick;

// Re-exports for convenience
pub use client::{Client, ClientConfig, ClientHandler, ClientState};
pub use config::{ConfigError, NetConfig};
pub use error::{NetError, NetResult};
pub use outbox::Outbox;
pub use protocol::{CodecError, Packet, PacketHeader, PacketType};
pub use server::{PeerContext, PeerId, Server, ServerConfig, ServerHandler, ServerState};
pub use socket::{Address, Family, Resolver, Socket, SocketKind, SystemResolver};
pub use system::{is_initialized, net_init, net_shutdown};
pub use tick::TickPacer;

/// Maximum size of one frame on the wire, header included.
///
/// 1400 bytes keeps a frame inside a single Ethernet MTU with room for
/// IP/TCP headers.
pub const MAX_FRAME_SIZE: usize = 1400;

/// Default capacity of each send and receive buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default cap on concurrently connected peers.
pub const DEFAULT_MAX_CLIENTS: usize = 64;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 7777;
