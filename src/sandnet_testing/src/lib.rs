// This crate contains testing utilities which need to be shared across multiple
// crates in this project.
use std::net::{Ipv4Addr, SocketAddrV4};

use anyhow::{bail, Result};
use once_cell::sync::OnceCell;
use sandnet_common::abi::{
    GUEST_AF_INET, GUEST_SA_DATA_OFFSET, GUEST_SOCKADDR_SIZE, GUEST_WORD_SIZE,
};
use tracing_subscriber::EnvFilter;

static TEST_TRACING: OnceCell<()> = OnceCell::new();

/// Install a `fmt` subscriber driven by `RUST_LOG` for the whole test
/// binary. Safe to call from every test; only the first call has any
/// effect.
pub fn init_test_tracing() {
    TEST_TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Encode `words` as a guest argument block: consecutive little-endian
/// 32-bit values.
pub fn arg_block(words: &[u32]) -> Vec<u8> {
    let mut block = Vec::with_capacity(words.len() * GUEST_WORD_SIZE);
    for word in words {
        block.extend_from_slice(&word.to_le_bytes());
    }
    block
}

/// Build the bytes of a guest `struct sockaddr_in` for `addr`, exactly
/// as the guest C library lays it out.
pub fn guest_sockaddr_in(addr: SocketAddrV4) -> [u8; GUEST_SOCKADDR_SIZE] {
    let mut bytes = [0_u8; GUEST_SOCKADDR_SIZE];
    bytes[..2].copy_from_slice(&(GUEST_AF_INET as u16).to_le_bytes());
    let data = GUEST_SA_DATA_OFFSET;
    bytes[data..data + 2].copy_from_slice(&addr.port().to_be_bytes());
    bytes[data + 2..data + 6].copy_from_slice(&addr.ip().octets());
    bytes
}

/// Parse guest `struct sockaddr_in` bytes back into an address. Fails
/// if the family is not the guest's `AF_INET`.
pub fn parse_guest_sockaddr_in(bytes: &[u8]) -> Result<SocketAddrV4> {
    if bytes.len() < GUEST_SOCKADDR_SIZE {
        bail!(
            "guest sockaddr needs {} bytes, got {}",
            GUEST_SOCKADDR_SIZE,
            bytes.len()
        );
    }
    let family = u16::from_le_bytes([bytes[0], bytes[1]]);
    if u32::from(family) != GUEST_AF_INET {
        bail!("guest sockaddr family {} is not AF_INET", family);
    }
    let data = GUEST_SA_DATA_OFFSET;
    let port = u16::from_be_bytes([bytes[data], bytes[data + 1]]);
    let ip = Ipv4Addr::new(
        bytes[data + 2],
        bytes[data + 3],
        bytes[data + 4],
        bytes[data + 5],
    );
    Ok(SocketAddrV4::new(ip, port))
}

/// `127.0.0.1` with an OS-assigned port
pub fn loopback_any_port() -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)
}
