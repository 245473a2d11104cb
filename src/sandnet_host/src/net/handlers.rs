//! Pass-through handlers, one per socket call that may reach the host.
//!
//! Every guest address is resolved through the memory view before the
//! host call is made, so a bad argument traps without the host ever
//! seeing it. The one exception is writeback after the call, whose
//! targets are validated up front as well.

use libc::socklen_t;
use tracing::warn;

use super::args::ArgumentBlock;
use super::consts::{translate_domain, translate_protocol, translate_type};
use super::host::{HostNet, HostResult};
use super::sockaddr::{decode_sock_addr, encode_sock_addr, encode_sock_len, HostSockAddr};
use crate::mem::guest_addr::GuestAddress;
use crate::mem::guest_mem::GuestMemory;
use crate::Result;

/// Translate the arguments of one call, make the host call and write
/// back any results. An `Err` traps the guest; a failed host call is an
/// `Ok` carrying its `errno`.
pub(crate) type Handler = fn(&dyn HostNet, &mut GuestMemory, &ArgumentBlock) -> Result<HostResult>;

pub(crate) fn socket(
    host: &dyn HostNet,
    _mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let domain = translate_domain(args.word(0)?).value();
    let ty = translate_type(args.word(1)?).value();
    let protocol = translate_protocol(args.word(2)?).value();

    let res = host.socket(domain, ty, protocol);
    if let Err(errno) = res {
        warn!("Socket error: {}", errno);
    }
    Ok(res)
}

pub(crate) fn connect(
    host: &dyn HostNet,
    mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let fd = args.int(0)?;
    let addr = decode_sock_addr(mem, args.addr(1)?)?;
    Ok(host.connect(fd, &addr, HostSockAddr::NATIVE_LEN))
}

pub(crate) fn bind(
    host: &dyn HostNet,
    mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let fd = args.int(0)?;
    let addr = decode_sock_addr(mem, args.addr(1)?)?;
    Ok(host.bind(fd, &addr, HostSockAddr::NATIVE_LEN))
}

pub(crate) fn send(
    host: &dyn HostNet,
    mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let fd = args.int(0)?;
    let buf = mem.slice(args.addr(1)?, args.len(2)?)?;
    Ok(host.send(fd, buf, args.int(3)?))
}

pub(crate) fn recv(
    host: &dyn HostNet,
    mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let fd = args.int(0)?;
    let flags = args.int(3)?;
    let buf = mem.slice_mut(args.addr(1)?, args.len(2)?)?;
    Ok(host.recv(fd, buf, flags))
}

/// The sixth word is the address length as a value. The host is always
/// given the native length instead.
pub(crate) fn sendto(
    host: &dyn HostNet,
    mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let fd = args.int(0)?;
    let flags = args.int(3)?;
    let addr = decode_sock_addr(mem, args.addr(4)?)?;
    let buf = mem.slice(args.addr(1)?, args.len(2)?)?;
    Ok(host.sendto(fd, buf, flags, &addr, HostSockAddr::NATIVE_LEN))
}

/// The sixth word is the guest address of the address length. A null
/// address pointer or a null length pointer means the guest does not
/// want the sender's address, and nothing is written back.
pub(crate) fn recvfrom(
    host: &dyn HostNet,
    mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let fd = args.int(0)?;
    let buf_addr = args.addr(1)?;
    let buf_len = args.len(2)?;
    let flags = args.int(3)?;
    let addr_ptr = args.addr(4)?;
    let len_ptr = args.addr(5)?;

    if addr_ptr == GuestAddress::zero() || len_ptr == GuestAddress::zero() {
        let buf = mem.slice_mut(buf_addr, buf_len)?;
        return Ok(host.recvfrom(fd, buf, flags, None));
    }

    let mut addr = decode_sock_addr(mem, addr_ptr)?;
    mem.read_u32(len_ptr)?;
    let mut len: socklen_t = HostSockAddr::NATIVE_LEN;
    let res = {
        let buf = mem.slice_mut(buf_addr, buf_len)?;
        host.recvfrom(fd, buf, flags, Some((&mut addr, &mut len)))
    };

    // the host may have rewritten both, even for an empty datagram
    encode_sock_addr(&addr, mem, addr_ptr)?;
    encode_sock_len(len, mem, len_ptr)?;
    Ok(res)
}

/// The guest's length value is ignored; the host is given the native
/// length and both are written back whatever the host returned.
pub(crate) fn getsockname(
    host: &dyn HostNet,
    mem: &mut GuestMemory,
    args: &ArgumentBlock,
) -> Result<HostResult> {
    let fd = args.int(0)?;
    let addr_ptr = args.addr(1)?;
    let len_ptr = args.addr(2)?;

    let mut addr = decode_sock_addr(mem, addr_ptr)?;
    mem.read_u32(len_ptr)?;
    let mut len: socklen_t = HostSockAddr::NATIVE_LEN;
    let res = host.getsockname(fd, &mut addr, &mut len);

    encode_sock_addr(&addr, mem, addr_ptr)?;
    encode_sock_len(len, mem, len_ptr)?;
    Ok(res)
}
