#![no_std]

/// Integer constants and fixed structure layouts as defined by the
/// guest's C library target.
pub mod abi;
/// The `socketcall` sub-call identifiers and their argument counts.
pub mod socketcall;

pub use socketcall::SocketCallId;
