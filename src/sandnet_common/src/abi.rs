//! Values below come from the guest C library's `sys/socket.h`,
//! `netinet/in.h` and `bits/errno.h` for the 32-bit linear-memory
//! target. They are an ABI contract with guest code and do not
//! follow the host platform.

pub const GUEST_PAGE_SHIFT: u32 = 16;
/// Guest linear memory grows in pages of this many bytes
pub const GUEST_PAGE_SIZE: usize = 1 << GUEST_PAGE_SHIFT;
/// Largest linear memory a 32-bit guest can address
pub const GUEST_MAX_PAGES: usize = 1 << (32 - GUEST_PAGE_SHIFT);

/// Width of one word in a `socketcall` argument block
pub const GUEST_WORD_SIZE: usize = 4;

pub const GUEST_AF_UNSPEC: u32 = 0;
pub const GUEST_AF_INET: u32 = 2;
pub const GUEST_AF_INET6: u32 = 10;

pub const GUEST_SOCK_STREAM: u32 = 1;
pub const GUEST_SOCK_DGRAM: u32 = 2;
/// Flag bits that may be or'ed into the socket type word
pub const GUEST_SOCK_NONBLOCK: u32 = 0o4000;
pub const GUEST_SOCK_CLOEXEC: u32 = 0o2000000;

pub const GUEST_IPPROTO_IP: u32 = 0;
pub const GUEST_IPPROTO_TCP: u32 = 6;
pub const GUEST_IPPROTO_UDP: u32 = 17;

/// Layout of `struct sockaddr` as the guest sees it:
///
/// ```text
/// offset 0   u16 sa_family (little-endian)
/// offset 2   u8  sa_data[14]
/// ```
pub const GUEST_SOCKADDR_SIZE: usize = 16;
pub const GUEST_SA_FAMILY_OFFSET: usize = 0;
pub const GUEST_SA_DATA_OFFSET: usize = 2;
pub const GUEST_SA_DATA_LEN: usize = 14;

/// `socklen_t` is a 32-bit unsigned integer in the guest
pub const GUEST_SOCKLEN_SIZE: usize = 4;
