use std::fmt;
use std::mem::size_of;

use libc::{c_char, sa_family_t, sockaddr, socklen_t};
use sandnet_common::abi::{
    GUEST_SA_DATA_LEN, GUEST_SA_DATA_OFFSET, GUEST_SA_FAMILY_OFFSET, GUEST_SOCKADDR_SIZE,
};
use tracing::{instrument, Span};

use super::consts::{guest_family_from_host, host_family_from_guest};
use crate::mem::guest_addr::GuestAddress;
use crate::mem::guest_mem::GuestMemory;
use crate::Result;

/// A native `struct sockaddr`, built field by field from a guest
/// address and never by copying the guest's bytes wholesale.
///
/// It is always exactly the size of the native generic `sockaddr`, which
/// holds the 14 data bytes the guest layout carries. Longer addresses
/// such as IPv6 are truncated by the host when it writes one back.
#[derive(Clone, Copy)]
pub struct HostSockAddr {
    inner: sockaddr,
}

impl HostSockAddr {
    /// The length passed to the host alongside every `HostSockAddr`
    pub const NATIVE_LEN: socklen_t = size_of::<sockaddr>() as socklen_t;

    /// Build a native address from its family and data bytes.
    pub fn new(family: sa_family_t, data: [u8; GUEST_SA_DATA_LEN]) -> Self {
        let mut sa_data = [0 as c_char; GUEST_SA_DATA_LEN];
        for (dst, src) in sa_data.iter_mut().zip(data) {
            *dst = src as c_char;
        }
        cfg_if::cfg_if! {
            if #[cfg(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly",
            ))] {
                let inner = sockaddr {
                    sa_len: size_of::<sockaddr>() as u8,
                    sa_family: family,
                    sa_data,
                };
            } else {
                let inner = sockaddr {
                    sa_family: family,
                    sa_data,
                };
            }
        }
        Self { inner }
    }

    /// An all-zero address, for the host to fill in
    pub fn zeroed() -> Self {
        Self::new(0, [0; GUEST_SA_DATA_LEN])
    }

    /// The native address family
    pub fn family(&self) -> sa_family_t {
        self.inner.sa_family
    }

    /// The first 14 bytes of family-specific data
    pub fn data(&self) -> [u8; GUEST_SA_DATA_LEN] {
        let mut data = [0_u8; GUEST_SA_DATA_LEN];
        for (dst, src) in data.iter_mut().zip(self.inner.sa_data) {
            *dst = src as u8;
        }
        data
    }

    /// Pointer for passing to a host call that reads the address
    pub fn as_ptr(&self) -> *const sockaddr {
        &self.inner
    }

    /// Pointer for passing to a host call that writes the address
    pub fn as_mut_ptr(&mut self) -> *mut sockaddr {
        &mut self.inner
    }
}

impl fmt::Debug for HostSockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostSockAddr")
            .field("family", &self.family())
            .field("data", &self.data())
            .finish()
    }
}

impl PartialEq for HostSockAddr {
    fn eq(&self, other: &Self) -> bool {
        self.family() == other.family() && self.data() == other.data()
    }
}

impl Eq for HostSockAddr {}

/// Read the guest `sockaddr` at `addr` and build the native address it
/// describes. All 16 guest bytes must be inside guest memory.
#[instrument(err(Debug), skip(mem), parent = Span::current(), level = "Trace")]
pub fn decode_sock_addr(mem: &GuestMemory, addr: GuestAddress) -> Result<HostSockAddr> {
    let bytes = mem.slice(addr, GUEST_SOCKADDR_SIZE)?;
    let family_offset = GUEST_SA_FAMILY_OFFSET;
    let family = u16::from_le_bytes(bytes[family_offset..family_offset + 2].try_into()?);
    let data: [u8; GUEST_SA_DATA_LEN] = bytes
        [GUEST_SA_DATA_OFFSET..GUEST_SA_DATA_OFFSET + GUEST_SA_DATA_LEN]
        .try_into()?;
    Ok(HostSockAddr::new(
        host_family_from_guest(family).value(),
        data,
    ))
}

/// Write `host` back into the guest `sockaddr` at `addr`: the family in
/// guest numbering, then the 14 data bytes. Either all 16 bytes are
/// written or none are.
#[instrument(err(Debug), skip(mem), parent = Span::current(), level = "Trace")]
pub fn encode_sock_addr(
    host: &HostSockAddr,
    mem: &mut GuestMemory,
    addr: GuestAddress,
) -> Result<()> {
    let mut bytes = [0_u8; GUEST_SOCKADDR_SIZE];
    let family = guest_family_from_host(host.family()).value();
    bytes[GUEST_SA_FAMILY_OFFSET..GUEST_SA_FAMILY_OFFSET + 2]
        .copy_from_slice(&family.to_le_bytes());
    bytes[GUEST_SA_DATA_OFFSET..].copy_from_slice(&host.data());
    mem.copy_from_slice(&bytes, addr)
}

/// Write a native `socklen_t` to the guest's 32-bit length at `addr`.
pub fn encode_sock_len(len: socklen_t, mem: &mut GuestMemory, addr: GuestAddress) -> Result<()> {
    mem.write_u32(addr, len)
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use sandnet_testing::guest_sockaddr_in;

    use super::*;

    fn mem_with(bytes: &[u8], at: u32) -> GuestMemory {
        let mut mem = GuestMemory::new(4096, 4096).unwrap();
        mem.copy_from_slice(bytes, GuestAddress::from(at)).unwrap();
        mem
    }

    #[test]
    fn decode_inet() {
        let guest = guest_sockaddr_in(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 8080));
        let mem = mem_with(&guest, 0x100);
        let host = decode_sock_addr(&mem, GuestAddress::from(0x100)).unwrap();
        assert_eq!(libc::AF_INET as sa_family_t, host.family());
        assert_eq!([0x1f, 0x90, 127, 0, 0, 1], host.data()[..6]);
        assert_eq!(16, HostSockAddr::NATIVE_LEN);
    }

    #[test]
    fn decode_then_encode_is_identical() {
        let mut guest = [0_u8; GUEST_SOCKADDR_SIZE];
        guest[0] = 10;
        for (i, b) in guest[2..].iter_mut().enumerate() {
            *b = 0xa0 + i as u8;
        }
        let mut mem = mem_with(&guest, 0x200);
        let host = decode_sock_addr(&mem, GuestAddress::from(0x200)).unwrap();
        assert_eq!(libc::AF_INET6 as sa_family_t, host.family());
        encode_sock_addr(&host, &mut mem, GuestAddress::from(0x300)).unwrap();
        assert_eq!(
            &guest[..],
            mem.slice(GuestAddress::from(0x300), GUEST_SOCKADDR_SIZE)
                .unwrap()
        );
    }

    #[test]
    fn straddling_sockaddr_is_rejected() {
        let mut mem = GuestMemory::new(64, 64).unwrap();
        let near_end = GuestAddress::from(56);
        assert!(decode_sock_addr(&mem, near_end).is_err());
        let host = HostSockAddr::new(libc::AF_INET as sa_family_t, [0xff; GUEST_SA_DATA_LEN]);
        assert!(encode_sock_addr(&host, &mut mem, near_end).is_err());
        assert!(mem
            .slice(near_end, 8)
            .unwrap()
            .iter()
            .all(|b| *b == 0));
    }

    #[test]
    fn sock_len() {
        let mut mem = GuestMemory::new(64, 64).unwrap();
        encode_sock_len(16, &mut mem, GuestAddress::from(8)).unwrap();
        assert_eq!(16, mem.read_u32(GuestAddress::from(8)).unwrap());
        assert!(encode_sock_len(16, &mut mem, GuestAddress::from(62)).is_err());
    }
}
