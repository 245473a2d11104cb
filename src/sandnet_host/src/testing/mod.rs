use std::sync::{Arc, Mutex};

use libc::{c_int, socklen_t};

use crate::net::host::{Errno, HostNet, HostResult};
use crate::net::sockaddr::HostSockAddr;

pub(crate) mod tracing_subscriber;

/// A host call as seen by `RecordingHostNet`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    Socket(c_int, c_int, c_int),
    Connect(c_int, HostSockAddr, socklen_t),
    Bind(c_int, HostSockAddr, socklen_t),
    Send(c_int, Vec<u8>, c_int),
    Recv(c_int, usize, c_int),
    SendTo(c_int, Vec<u8>, c_int, HostSockAddr, socklen_t),
    RecvFrom(c_int, usize, c_int, Option<HostSockAddr>),
    GetSockName(c_int),
}

/// A `HostNet` that records every call and answers from a script
/// instead of reaching the OS.
///
/// Receives fill the guest buffer with `recv_data` and report
/// `peer`/`peer_len` as the source or bound address.
#[derive(Debug, Clone)]
pub(crate) struct RecordingHostNet {
    calls: Arc<Mutex<Vec<HostCall>>>,
    result: HostResult,
    recv_data: Vec<u8>,
    peer: HostSockAddr,
    peer_len: socklen_t,
}

impl RecordingHostNet {
    /// Every call succeeds with `ret`
    pub(crate) fn returning(ret: isize) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            result: Ok(ret),
            recv_data: Vec::new(),
            peer: HostSockAddr::zeroed(),
            peer_len: HostSockAddr::NATIVE_LEN,
        }
    }

    /// Every call fails with `errno`
    pub(crate) fn failing(errno: i32) -> Self {
        Self {
            result: Err(Errno(errno)),
            ..Self::returning(0)
        }
    }

    pub(crate) fn with_recv_data(mut self, data: &[u8]) -> Self {
        self.recv_data = data.to_vec();
        self
    }

    pub(crate) fn with_peer(mut self, peer: HostSockAddr, len: socklen_t) -> Self {
        self.peer = peer;
        self.peer_len = len;
        self
    }

    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: HostCall) -> HostResult {
        self.calls.lock().unwrap().push(call);
        self.result
    }

    fn fill(&self, buf: &mut [u8]) {
        let n = buf.len().min(self.recv_data.len());
        buf[..n].copy_from_slice(&self.recv_data[..n]);
    }
}

impl HostNet for RecordingHostNet {
    fn socket(&self, domain: c_int, ty: c_int, protocol: c_int) -> HostResult {
        self.record(HostCall::Socket(domain, ty, protocol))
    }

    fn connect(&self, fd: c_int, addr: &HostSockAddr, len: socklen_t) -> HostResult {
        self.record(HostCall::Connect(fd, *addr, len))
    }

    fn bind(&self, fd: c_int, addr: &HostSockAddr, len: socklen_t) -> HostResult {
        self.record(HostCall::Bind(fd, *addr, len))
    }

    fn send(&self, fd: c_int, buf: &[u8], flags: c_int) -> HostResult {
        self.record(HostCall::Send(fd, buf.to_vec(), flags))
    }

    fn recv(&self, fd: c_int, buf: &mut [u8], flags: c_int) -> HostResult {
        self.fill(buf);
        self.record(HostCall::Recv(fd, buf.len(), flags))
    }

    fn sendto(
        &self,
        fd: c_int,
        buf: &[u8],
        flags: c_int,
        addr: &HostSockAddr,
        len: socklen_t,
    ) -> HostResult {
        self.record(HostCall::SendTo(fd, buf.to_vec(), flags, *addr, len))
    }

    fn recvfrom(
        &self,
        fd: c_int,
        buf: &mut [u8],
        flags: c_int,
        src: Option<(&mut HostSockAddr, &mut socklen_t)>,
    ) -> HostResult {
        self.fill(buf);
        let passed = match src {
            Some((addr, len)) => {
                let passed = *addr;
                *addr = self.peer;
                *len = self.peer_len;
                Some(passed)
            }
            None => None,
        };
        self.record(HostCall::RecvFrom(fd, buf.len(), flags, passed))
    }

    fn getsockname(
        &self,
        fd: c_int,
        addr: &mut HostSockAddr,
        len: &mut socklen_t,
    ) -> HostResult {
        *addr = self.peer;
        *len = self.peer_len;
        self.record(HostCall::GetSockName(fd))
    }
}
