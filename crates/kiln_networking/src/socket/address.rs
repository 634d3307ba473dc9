//! # Addresses and Name Resolution
//!
//! An [`Address`] couples a socket address with its presentation-form IP.
//! Resolution goes through the [`Resolver`] trait so hosts and tests can swap
//! the OS resolver for their own.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use socket2::SockAddr;

use super::SocketKind;
use crate::error::{NetError, NetResult};
use crate::system::ensure_initialized;

/// IP address family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

/// An immutable, owned network endpoint.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Numeric socket address.
    addr: SocketAddr,
    /// Presentation form of the IP, e.g. `127.0.0.1` or `::1`.
    text: String,
}

impl Address {
    /// Creates an address from an IP and port.
    #[must_use]
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self::from(SocketAddr::new(ip, port))
    }

    /// Returns the address family.
    #[inline]
    #[must_use]
    pub const fn family(&self) -> Family {
        match self.addr {
            SocketAddr::V4(_) => Family::V4,
            SocketAddr::V6(_) => Family::V6,
        }
    }

    /// Returns the port in host byte order.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the IP.
    #[inline]
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Returns the presentation form of the IP.
    #[inline]
    #[must_use]
    pub fn ip_text(&self) -> &str {
        &self.text
    }

    /// Returns the numeric socket address.
    #[inline]
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the raw OS representation.
    #[must_use]
    pub fn to_sock_addr(&self) -> SockAddr {
        SockAddr::from(self.addr)
    }

    /// Converts a raw OS address, if it is an IP address.
    pub(crate) fn from_sock_addr(raw: &SockAddr) -> Option<Self> {
        raw.as_socket().map(Self::from)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self {
            addr,
            text: addr.ip().to_string(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.addr)
    }
}

/// Source of candidate addresses for a host name.
pub trait Resolver {
    /// Resolves `host:port` for a socket of `kind`.
    ///
    /// # Errors
    ///
    /// [`NetError::ResolveFailed`] when nothing usable comes back.
    fn resolve(&self, host: &str, port: u16, kind: SocketKind) -> NetResult<Vec<Address>>;
}

/// The operating system's name resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16, kind: SocketKind) -> NetResult<Vec<Address>> {
        let mut out = Vec::new();
        resolve_into(host, port, kind, &mut out)?;
        Ok(out)
    }
}

/// Resolves `host:port` and appends every returned address to `out`.
///
/// Both families are requested. Addresses that cannot be used (port zero
/// returned for a non-zero request) are logged and skipped rather than
/// failing the whole lookup.
///
/// Returns the number of addresses appended.
///
/// # Errors
///
/// - [`NetError::NotInitialized`] outside `net_init`/`net_shutdown`
/// - [`NetError::InvalidArgument`] for an empty host
/// - [`NetError::AddrInfoFailed`] when the lookup itself fails or the input is malformed
/// - [`NetError::ResolveFailed`] when the name is unknown or nothing usable is returned
/// - [`NetError::OutOfMemory`] when `out` cannot grow
pub fn resolve_into(
    host: &str,
    port: u16,
    kind: SocketKind,
    out: &mut Vec<Address>,
) -> NetResult<usize> {
    ensure_initialized()?;
    if host.is_empty() {
        return Err(NetError::InvalidArgument);
    }

    let found = (host, port).to_socket_addrs().map_err(|err| {
        tracing::warn!("Resolving {}:{} failed: {}", host, port, err);
        lookup_error(&err)
    })?;

    let before = out.len();
    for addr in found {
        if port != 0 && addr.port() == 0 {
            tracing::warn!("Skipping unusable address {} for {}", addr, host);
            continue;
        }
        out.try_reserve(1).map_err(|_| NetError::OutOfMemory)?;
        out.push(Address::from(addr));
    }

    let added = out.len() - before;
    if added == 0 {
        tracing::warn!("Resolving {}:{} returned no addresses", host, port);
        return Err(NetError::ResolveFailed);
    }

    tracing::debug!("Resolved {}:{} ({:?}) to {} address(es)", host, port, kind, added);
    Ok(added)
}

/// Classifies a failed lookup.
///
/// The system resolver reports "no such name" (and other lookup answers) as
/// a plain error without an OS code; a raw OS code or malformed input means
/// the lookup itself went wrong.
fn lookup_error(err: &io::Error) -> NetError {
    if err.raw_os_error().is_some() || err.kind() == io::ErrorKind::InvalidInput {
        NetError::AddrInfoFailed
    } else {
        NetError::ResolveFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn test_address_accessors() {
        let addr: Address = "127.0.0.1:7777".parse::<SocketAddr>().unwrap().into();
        assert_eq!(addr.family(), Family::V4);
        assert_eq!(addr.port(), 7777);
        assert_eq!(addr.ip_text(), "127.0.0.1");
        assert_eq!(addr.to_string(), "127.0.0.1:7777");
    }

    #[test]
    fn test_v6_presentation_form() {
        let addr = Address::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 80);
        assert_eq!(addr.family(), Family::V6);
        assert_eq!(addr.ip_text(), "::1");
    }

    #[test]
    fn test_sock_addr_round_trip() {
        let addr: Address = "10.0.0.1:9".parse::<SocketAddr>().unwrap().into();
        let raw = addr.to_sock_addr();
        assert_eq!(Address::from_sock_addr(&raw), Some(addr));
    }

    #[test]
    fn test_resolve_numeric_host() {
        let _ = crate::net_init();

        let mut out = Vec::new();
        let added = resolve_into("127.0.0.1", 4000, SocketKind::Tcp, &mut out).unwrap();
        assert_eq!(added, 1);
        assert_eq!(out[0].port(), 4000);
        assert_eq!(out[0].ip_text(), "127.0.0.1");
    }

    #[test]
    fn test_resolve_appends() {
        let _ = crate::net_init();

        let mut out = vec![Address::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 1)];
        resolve_into("127.0.0.1", 2, SocketKind::Udp, &mut out).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].port(), 2);
    }

    #[test]
    fn test_resolve_empty_host() {
        let _ = crate::net_init();

        let result = SystemResolver.resolve("", 80, SocketKind::Tcp);
        assert_eq!(result, Err(NetError::InvalidArgument));
    }

    #[test]
    fn test_lookup_error_classification() {
        let not_found = io::Error::new(
            io::ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        );
        assert_eq!(lookup_error(&not_found), NetError::ResolveFailed);

        let malformed = io::Error::new(io::ErrorKind::InvalidInput, "invalid socket address");
        assert_eq!(lookup_error(&malformed), NetError::AddrInfoFailed);

        let system = io::Error::from_raw_os_error(12);
        assert_eq!(lookup_error(&system), NetError::AddrInfoFailed);
    }
}
