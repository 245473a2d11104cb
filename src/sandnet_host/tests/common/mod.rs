use std::net::SocketAddrV4;

use sandnet_common::abi::GUEST_SOCKADDR_SIZE;
use sandnet_common::SocketCallId;
use sandnet_host::{GuestAddress, NetworkSandbox, Result, SandboxConfiguration};
use sandnet_testing::{arg_block, guest_sockaddr_in, init_test_tracing, parse_guest_sockaddr_in};

/// Where each test places things in guest memory
pub const ARGS: u32 = 0x100;
pub const SOCKADDR: u32 = 0x200;
pub const SOCKLEN: u32 = 0x240;
pub const BUF: u32 = 0x1000;
pub const BUF_LEN: u32 = 0x1000;

/// A sandbox on the real host network plus the bookkeeping a guest C
/// library would do: laying out argument blocks and addresses.
pub struct Guest {
    pub sbox: NetworkSandbox,
}

impl Guest {
    pub fn new() -> Self {
        init_test_tracing();
        Self {
            sbox: NetworkSandbox::new(SandboxConfiguration::default()).unwrap(),
        }
    }

    pub fn call(&mut self, call: SocketCallId, args: &[u32]) -> Result<i32> {
        self.sbox
            .memory_mut()
            .copy_from_slice(&arg_block(args), GuestAddress::from(ARGS))?;
        self.sbox.socketcall(call as i32, ARGS as i32)
    }

    pub fn put_sockaddr(&mut self, addr: SocketAddrV4) {
        self.sbox
            .memory_mut()
            .copy_from_slice(&guest_sockaddr_in(addr), GuestAddress::from(SOCKADDR))
            .unwrap();
    }

    pub fn sockaddr(&self) -> SocketAddrV4 {
        let bytes = self
            .sbox
            .memory()
            .slice(GuestAddress::from(SOCKADDR), GUEST_SOCKADDR_SIZE)
            .unwrap();
        parse_guest_sockaddr_in(bytes).unwrap()
    }

    pub fn socklen(&self) -> u32 {
        self.sbox
            .memory()
            .read_u32(GuestAddress::from(SOCKLEN))
            .unwrap()
    }

    pub fn put_buf(&mut self, data: &[u8]) {
        self.sbox
            .memory_mut()
            .copy_from_slice(data, GuestAddress::from(BUF))
            .unwrap();
    }

    pub fn buf(&self, len: usize) -> Vec<u8> {
        self.sbox
            .memory()
            .slice(GuestAddress::from(BUF), len)
            .unwrap()
            .to_vec()
    }

    /// Open a socket and bind it to `addr`, returning the descriptor
    /// and the address the host actually bound.
    pub fn bound_socket(
        &mut self,
        ty: u32,
        protocol: u32,
        addr: SocketAddrV4,
    ) -> (i32, SocketAddrV4) {
        let fd = self.call(SocketCallId::Socket, &[2, ty, protocol]).unwrap();
        assert!(fd >= 0, "socket failed: {}", fd);
        self.put_sockaddr(addr);
        assert_eq!(
            0,
            self.call(SocketCallId::Bind, &[fd as u32, SOCKADDR, 16])
                .unwrap()
        );
        assert_eq!(
            0,
            self.call(SocketCallId::GetSockName, &[fd as u32, SOCKADDR, SOCKLEN])
                .unwrap()
        );
        (fd, self.sockaddr())
    }
}

/// Close a descriptor the guest opened; the translator never does
pub fn close(fd: i32) {
    assert_eq!(0, unsafe { libc::close(fd) });
}
