use bitflags::bitflags;
use libc::{c_int, sa_family_t};
use sandnet_common::abi::{
    GUEST_AF_INET, GUEST_AF_INET6, GUEST_AF_UNSPEC, GUEST_IPPROTO_IP, GUEST_IPPROTO_TCP,
    GUEST_IPPROTO_UDP, GUEST_SOCK_CLOEXEC, GUEST_SOCK_DGRAM, GUEST_SOCK_NONBLOCK,
    GUEST_SOCK_STREAM,
};
use tracing::warn;

/// The outcome of translating a guest constant to its host value, or
/// back.
///
/// Values with no entry in a translation table are not errors: they
/// are handed on unchanged and the host call decides what to make of
/// them. `PassedThrough` records that this happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translated<T> {
    /// The value had a table entry
    Mapped(T),
    /// The value had no table entry and was forwarded unchanged
    PassedThrough(T),
}

impl<T: Copy> Translated<T> {
    /// The value to use, whichever way it was obtained
    pub fn value(&self) -> T {
        match self {
            Translated::Mapped(v) | Translated::PassedThrough(v) => *v,
        }
    }

    /// Whether the value came from a table entry
    pub fn is_mapped(&self) -> bool {
        matches!(self, Translated::Mapped(_))
    }
}

bitflags! {
    /// Flag bits the guest may or into the `type` argument of `socket`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GuestSockFlags: u32 {
        /// Open the socket in non-blocking mode
        const NONBLOCK = GUEST_SOCK_NONBLOCK;
        /// Close the socket on exec
        const CLOEXEC = GUEST_SOCK_CLOEXEC;
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly",
        target_os = "illumos",
    ))] {
        fn host_sock_flags(flags: GuestSockFlags) -> Translated<c_int> {
            let mut host = 0;
            if flags.contains(GuestSockFlags::NONBLOCK) {
                host |= libc::SOCK_NONBLOCK;
            }
            if flags.contains(GuestSockFlags::CLOEXEC) {
                host |= libc::SOCK_CLOEXEC;
            }
            Translated::Mapped(host)
        }
    } else {
        // no type flags on this host, the call will reject them
        fn host_sock_flags(flags: GuestSockFlags) -> Translated<c_int> {
            if flags.is_empty() {
                Translated::Mapped(0)
            } else {
                Translated::PassedThrough(flags.bits() as c_int)
            }
        }
    }
}

/// Translate the guest's `domain` argument of `socket` to the host's
/// address family.
pub fn translate_domain(guest: u32) -> Translated<c_int> {
    match guest {
        GUEST_AF_INET => Translated::Mapped(libc::AF_INET),
        GUEST_AF_INET6 => Translated::Mapped(libc::AF_INET6),
        _ => {
            warn!("Unrecognised socket domain ({})", guest);
            Translated::PassedThrough(guest as c_int)
        }
    }
}

/// Translate the guest's `type` argument of `socket`, including any
/// `SOCK_NONBLOCK`/`SOCK_CLOEXEC` bits, to the host's socket type.
pub fn translate_type(guest: u32) -> Translated<c_int> {
    let flags = GuestSockFlags::from_bits_truncate(guest);
    let base = guest & !GuestSockFlags::all().bits();
    let host_flags = host_sock_flags(flags);
    match base {
        GUEST_SOCK_STREAM if host_flags.is_mapped() => {
            Translated::Mapped(libc::SOCK_STREAM | host_flags.value())
        }
        GUEST_SOCK_DGRAM if host_flags.is_mapped() => {
            Translated::Mapped(libc::SOCK_DGRAM | host_flags.value())
        }
        GUEST_SOCK_STREAM => {
            warn!("Unsupported socket type flags ({:?})", flags);
            Translated::PassedThrough(libc::SOCK_STREAM | host_flags.value())
        }
        GUEST_SOCK_DGRAM => {
            warn!("Unsupported socket type flags ({:?})", flags);
            Translated::PassedThrough(libc::SOCK_DGRAM | host_flags.value())
        }
        _ => {
            warn!("Unrecognised socket type ({})", guest);
            Translated::PassedThrough(base as c_int | host_flags.value())
        }
    }
}

/// Translate the guest's `protocol` argument of `socket`.
pub fn translate_protocol(guest: u32) -> Translated<c_int> {
    match guest {
        GUEST_IPPROTO_IP => Translated::Mapped(libc::IPPROTO_IP),
        GUEST_IPPROTO_TCP => Translated::Mapped(libc::IPPROTO_TCP),
        GUEST_IPPROTO_UDP => Translated::Mapped(libc::IPPROTO_UDP),
        _ => {
            warn!("Unrecognised protocol ({})", guest);
            Translated::PassedThrough(guest as c_int)
        }
    }
}

/// Translate the `sa_family` field of a guest `sockaddr` to the host.
pub fn host_family_from_guest(guest: u16) -> Translated<sa_family_t> {
    match u32::from(guest) {
        GUEST_AF_UNSPEC => Translated::Mapped(libc::AF_UNSPEC as sa_family_t),
        GUEST_AF_INET => Translated::Mapped(libc::AF_INET as sa_family_t),
        GUEST_AF_INET6 => Translated::Mapped(libc::AF_INET6 as sa_family_t),
        _ => {
            warn!("Unrecognised address family ({})", guest);
            Translated::PassedThrough(guest as sa_family_t)
        }
    }
}

/// Translate a host `sa_family` back to the guest's numbering, for
/// addresses the host wrote.
pub fn guest_family_from_host(host: sa_family_t) -> Translated<u16> {
    match c_int::from(host) {
        libc::AF_UNSPEC => Translated::Mapped(GUEST_AF_UNSPEC as u16),
        libc::AF_INET => Translated::Mapped(GUEST_AF_INET as u16),
        libc::AF_INET6 => Translated::Mapped(GUEST_AF_INET6 as u16),
        _ => {
            warn!("Unrecognised host address family ({})", host);
            Translated::PassedThrough(u16::from(host))
        }
    }
}
