//! # Network Subsystem Lifecycle
//!
//! The process-wide "initialized" flag is the only global state in the
//! crate. Winsock startup on Windows is performed by the socket library on
//! first use, so the flag is all that `net_init` has to manage; it still
//! gates every socket operation so that use-after-shutdown is reported
//! uniformly on every platform.
//!
//! Concurrent init/shutdown from several threads is the caller's problem.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{NetError, NetResult};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the network subsystem.
///
/// Must be called once before the first socket is created.
///
/// # Errors
///
/// Returns [`NetError::AlreadyInitialized`] if the subsystem is already up.
pub fn net_init() -> NetResult<()> {
    INITIALIZED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .map_err(|_| NetError::AlreadyInitialized)?;
    tracing::info!("Network subsystem initialized");
    Ok(())
}

/// Releases the network subsystem.
///
/// Sockets that are still alive keep their OS handles until dropped, but
/// every further socket operation fails with [`NetError::NotInitialized`].
pub fn net_shutdown() {
    if INITIALIZED.swap(false, Ordering::AcqRel) {
        tracing::info!("Network subsystem shut down");
    }
}

/// Returns true between [`net_init`] and [`net_shutdown`].
#[inline]
#[must_use]
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// Fails with [`NetError::NotInitialized`] outside the init/shutdown window.
#[inline]
pub(crate) fn ensure_initialized() -> NetResult<()> {
    if is_initialized() {
        Ok(())
    } else {
        Err(NetError::NotInitialized)
    }
}
