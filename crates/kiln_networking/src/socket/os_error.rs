//! # Native Error Mapping
//!
//! Maps each platform's socket error codes onto [`NetError`].
//!
//! ```text
//! EWOULDBLOCK / EAGAIN / EINPROGRESS    -> WouldBlock
//! ECONNRESET / ENOTCONN / EPIPE         -> RecvFailed (SendFailed on send)
//! EADDRINUSE / EACCES / EADDRNOTAVAIL   -> BindFailed
//! ECONNREFUSED / ETIMEDOUT / *UNREACH   -> ConnectFailed
//! anything else                         -> UnknownError (logged)
//! ```

use std::io;

use crate::error::NetError;

/// The socket call that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Create,
    Bind,
    Listen,
    Accept,
    Connect,
    Send,
    Recv,
    SetOpt,
}

#[cfg(unix)]
mod codes {
    pub const WOULD_BLOCK: &[i32] = &[
        libc::EWOULDBLOCK,
        libc::EAGAIN,
        libc::EINPROGRESS,
        libc::EALREADY,
    ];
    pub const CONNECTION_LOST: &[i32] = &[
        libc::ECONNRESET,
        libc::ENOTCONN,
        libc::EPIPE,
        libc::ECONNABORTED,
        libc::ESHUTDOWN,
    ];
    pub const ADDRESS: &[i32] = &[
        libc::EADDRINUSE,
        libc::EACCES,
        libc::EPERM,
        libc::EADDRNOTAVAIL,
    ];
    pub const UNREACHABLE: &[i32] = &[
        libc::ECONNREFUSED,
        libc::ETIMEDOUT,
        libc::ENETUNREACH,
        libc::EHOSTUNREACH,
        libc::ENETDOWN,
    ];
    pub const INVALID: &[i32] = &[
        libc::EINVAL,
        libc::EAFNOSUPPORT,
        libc::EBADF,
        libc::ENOTSOCK,
        libc::EISCONN,
    ];
    pub const EXHAUSTED: &[i32] = &[libc::ENOMEM, libc::ENOBUFS];
    pub const DESCRIPTORS: &[i32] = &[libc::EMFILE, libc::ENFILE];
}

#[cfg(windows)]
mod codes {
    const WSAEBADF: i32 = 10009;
    const WSAEACCES: i32 = 10013;
    const WSAEINVAL: i32 = 10022;
    const WSAEMFILE: i32 = 10024;
    const WSAEWOULDBLOCK: i32 = 10035;
    const WSAEINPROGRESS: i32 = 10036;
    const WSAEALREADY: i32 = 10037;
    const WSAENOTSOCK: i32 = 10038;
    const WSAEAFNOSUPPORT: i32 = 10047;
    const WSAEADDRINUSE: i32 = 10048;
    const WSAEADDRNOTAVAIL: i32 = 10049;
    const WSAENETDOWN: i32 = 10050;
    const WSAENETUNREACH: i32 = 10051;
    const WSAECONNABORTED: i32 = 10053;
    const WSAECONNRESET: i32 = 10054;
    const WSAENOBUFS: i32 = 10055;
    const WSAEISCONN: i32 = 10056;
    const WSAENOTCONN: i32 = 10057;
    const WSAESHUTDOWN: i32 = 10058;
    const WSAETIMEDOUT: i32 = 10060;
    const WSAECONNREFUSED: i32 = 10061;
    const WSAEHOSTUNREACH: i32 = 10065;

    pub const WOULD_BLOCK: &[i32] = &[WSAEWOULDBLOCK, WSAEINPROGRESS, WSAEALREADY];
    pub const CONNECTION_LOST: &[i32] = &[WSAECONNRESET, WSAENOTCONN, WSAECONNABORTED, WSAESHUTDOWN];
    pub const ADDRESS: &[i32] = &[WSAEADDRINUSE, WSAEACCES, WSAEADDRNOTAVAIL];
    pub const UNREACHABLE: &[i32] = &[WSAECONNREFUSED, WSAETIMEDOUT, WSAENETUNREACH, WSAEHOSTUNREACH, WSAENETDOWN];
    pub const INVALID: &[i32] = &[WSAEINVAL, WSAEAFNOSUPPORT, WSAEBADF, WSAENOTSOCK, WSAEISCONN];
    pub const EXHAUSTED: &[i32] = &[WSAENOBUFS];
    pub const DESCRIPTORS: &[i32] = &[WSAEMFILE];
}

/// Classifies an I/O error raised by `op`.
pub(crate) fn map_io_error(err: &io::Error, op: Op) -> NetError {
    let Some(code) = err.raw_os_error() else {
        // Synthesized by the standard library rather than the OS.
        return match err.kind() {
            io::ErrorKind::WouldBlock => NetError::WouldBlock,
            io::ErrorKind::InvalidInput => NetError::InvalidArgument,
            io::ErrorKind::OutOfMemory => NetError::OutOfMemory,
            _ => {
                tracing::warn!("Unmapped {:?} error during {:?}: {}", err.kind(), op, err);
                NetError::UnknownError
            }
        };
    };

    map_os_code(code, op).unwrap_or_else(|| {
        tracing::warn!("Unmapped OS error {} during {:?}: {}", code, op, err);
        NetError::UnknownError
    })
}

/// Looks `code` up in the platform table.
fn map_os_code(code: i32, op: Op) -> Option<NetError> {
    if codes::WOULD_BLOCK.contains(&code) {
        return Some(NetError::WouldBlock);
    }
    if codes::CONNECTION_LOST.contains(&code) {
        return Some(match op {
            Op::Send => NetError::SendFailed,
            Op::Connect => NetError::ConnectFailed,
            Op::Accept => NetError::AcceptFailed,
            _ => NetError::RecvFailed,
        });
    }
    if codes::ADDRESS.contains(&code) {
        return Some(NetError::BindFailed);
    }
    if codes::UNREACHABLE.contains(&code) {
        return Some(NetError::ConnectFailed);
    }
    if codes::INVALID.contains(&code) {
        return Some(NetError::InvalidArgument);
    }
    if codes::EXHAUSTED.contains(&code) {
        return Some(NetError::OutOfMemory);
    }
    if codes::DESCRIPTORS.contains(&code) {
        return Some(match op {
            Op::Accept => NetError::AcceptFailed,
            _ => NetError::SocketCreateFailed,
        });
    }
    None
}
