use std::fmt::{self, Debug, Display};
use std::io::Error;

use libc::{c_int, c_void, socklen_t};

use super::sockaddr::HostSockAddr;

/// An `errno` value reported by a failed host call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Errno(pub i32);

impl Errno {
    /// The `errno` left by the most recent failed libc call on this
    /// thread
    pub fn last() -> Self {
        Self(Error::last_os_error().raw_os_error().unwrap_or(libc::EIO))
    }

    /// The value as the guest sees it: a negated `errno`, in the
    /// convention of a raw syscall
    pub fn as_guest_return(self) -> i32 {
        self.0.saturating_neg()
    }
}

impl Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", Error::from_raw_os_error(self.0), self.0)
    }
}

/// The result of one host call: the call's non-negative return value,
/// or the `errno` it failed with.
pub type HostResult = std::result::Result<isize, Errno>;

/// The outbound POSIX socket calls that guests are allowed to reach.
///
/// Arguments are already in host form. Buffers are borrowed from guest
/// memory for the duration of the call only. Implementations must not
/// retain them.
pub trait HostNet: Send + Sync + Debug {
    /// `socket(2)`
    fn socket(&self, domain: c_int, ty: c_int, protocol: c_int) -> HostResult;

    /// `connect(2)`
    fn connect(&self, fd: c_int, addr: &HostSockAddr, len: socklen_t) -> HostResult;

    /// `bind(2)`
    fn bind(&self, fd: c_int, addr: &HostSockAddr, len: socklen_t) -> HostResult;

    /// `send(2)`
    fn send(&self, fd: c_int, buf: &[u8], flags: c_int) -> HostResult;

    /// `recv(2)`
    fn recv(&self, fd: c_int, buf: &mut [u8], flags: c_int) -> HostResult;

    /// `sendto(2)`
    fn sendto(
        &self,
        fd: c_int,
        buf: &[u8],
        flags: c_int,
        addr: &HostSockAddr,
        len: socklen_t,
    ) -> HostResult;

    /// `recvfrom(2)`. When `src` is `None` the sender's address is not
    /// requested.
    fn recvfrom(
        &self,
        fd: c_int,
        buf: &mut [u8],
        flags: c_int,
        src: Option<(&mut HostSockAddr, &mut socklen_t)>,
    ) -> HostResult;

    /// `getsockname(2)`
    fn getsockname(&self, fd: c_int, addr: &mut HostSockAddr, len: &mut socklen_t)
        -> HostResult;
}

/// A `HostNet` that makes the real calls through `libc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcHostNet;

impl LibcHostNet {
    /// Create a new `LibcHostNet`
    pub fn new() -> Self {
        Self
    }
}

fn check(ret: isize) -> HostResult {
    if ret < 0 {
        Err(Errno::last())
    } else {
        Ok(ret)
    }
}

// Every call below only passes pointers derived from live borrows with
// their exact lengths, and the kernel does not keep them past the call.
impl HostNet for LibcHostNet {
    fn socket(&self, domain: c_int, ty: c_int, protocol: c_int) -> HostResult {
        check(unsafe { libc::socket(domain, ty, protocol) } as isize)
    }

    fn connect(&self, fd: c_int, addr: &HostSockAddr, len: socklen_t) -> HostResult {
        check(unsafe { libc::connect(fd, addr.as_ptr(), len) } as isize)
    }

    fn bind(&self, fd: c_int, addr: &HostSockAddr, len: socklen_t) -> HostResult {
        check(unsafe { libc::bind(fd, addr.as_ptr(), len) } as isize)
    }

    fn send(&self, fd: c_int, buf: &[u8], flags: c_int) -> HostResult {
        check(unsafe { libc::send(fd, buf.as_ptr() as *const c_void, buf.len(), flags) })
    }

    fn recv(&self, fd: c_int, buf: &mut [u8], flags: c_int) -> HostResult {
        check(unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut c_void, buf.len(), flags) })
    }

    fn sendto(
        &self,
        fd: c_int,
        buf: &[u8],
        flags: c_int,
        addr: &HostSockAddr,
        len: socklen_t,
    ) -> HostResult {
        check(unsafe {
            libc::sendto(
                fd,
                buf.as_ptr() as *const c_void,
                buf.len(),
                flags,
                addr.as_ptr(),
                len,
            )
        })
    }

    fn recvfrom(
        &self,
        fd: c_int,
        buf: &mut [u8],
        flags: c_int,
        src: Option<(&mut HostSockAddr, &mut socklen_t)>,
    ) -> HostResult {
        let (addr, len) = match src {
            Some((addr, len)) => (addr.as_mut_ptr(), len as *mut socklen_t),
            None => (std::ptr::null_mut(), std::ptr::null_mut()),
        };
        check(unsafe {
            libc::recvfrom(
                fd,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                flags,
                addr,
                len,
            )
        })
    }

    fn getsockname(
        &self,
        fd: c_int,
        addr: &mut HostSockAddr,
        len: &mut socklen_t,
    ) -> HostResult {
        check(unsafe { libc::getsockname(fd, addr.as_mut_ptr(), len) } as isize)
    }
}
