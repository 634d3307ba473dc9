//! # Network Error Types
//!
//! One cross-platform result kind for every failure the core can report.
//! `Success` is `Ok(..)`; everything else is a [`NetError`].

use kiln_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the network core.
///
/// [`NetError::WouldBlock`] and [`NetError::NoData`] are not failures: they
/// are the normal "nothing to do right now" answers of a non-blocking socket
/// and the pump loops treat them as control flow.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetError {
    /// An argument was not valid for this operation or socket kind.
    #[error("invalid argument")]
    InvalidArgument,
    /// The network subsystem could not be initialized.
    #[error("network subsystem initialization failed")]
    InitFailed,
    /// The OS refused to create a socket.
    #[error("socket creation failed")]
    SocketCreateFailed,
    /// Binding to the requested address failed.
    #[error("bind failed")]
    BindFailed,
    /// Switching the socket to listening mode failed.
    #[error("listen failed")]
    ListenFailed,
    /// Accepting an incoming connection failed.
    #[error("accept failed")]
    AcceptFailed,
    /// Connecting to the remote endpoint failed.
    #[error("connect failed")]
    ConnectFailed,
    /// Sending failed; the connection is unusable.
    #[error("send failed")]
    SendFailed,
    /// Receiving failed; the connection is unusable.
    #[error("receive failed")]
    RecvFailed,
    /// The operation would have to suspend.
    #[error("operation would block")]
    WouldBlock,
    /// A non-blocking read found nothing to read.
    #[error("no data available")]
    NoData,
    /// Name resolution produced no usable address.
    #[error("address resolution failed")]
    ResolveFailed,
    /// A socket option could not be applied.
    #[error("setting socket option failed")]
    SetOptFailed,
    /// The resolver itself reported an error.
    #[error("address info lookup failed")]
    AddrInfoFailed,
    /// The network subsystem is not initialized.
    #[error("network subsystem not initialized")]
    NotInitialized,
    /// The network subsystem was already initialized.
    #[error("network subsystem already initialized")]
    AlreadyInitialized,
    /// The object is not in a state that allows this operation.
    #[error("invalid state for this operation")]
    InvalidState,
    /// A buffer or address list could not be allocated.
    #[error("out of memory")]
    OutOfMemory,
    /// The OS reported an error with no cross-platform mapping.
    #[error("unknown error")]
    UnknownError,
}

impl NetError {
    /// Returns true for the non-error "try again later" kinds.
    #[inline]
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::WouldBlock | Self::NoData)
    }
}

impl From<CoreError> for NetError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::OutOfMemory { .. } => Self::OutOfMemory,
        }
    }
}

/// Result type for network operations.
pub type NetResult<T> = Result<T, NetError>;
