#![deny(missing_docs)]
//! This crate translates the networking syscalls of an untrusted guest
//! module, running against a flat linear memory, into calls on the
//! host operating system.

#[cfg(not(unix))]
compile_error!("sandnet only supports unix hosts");
#[cfg(not(target_pointer_width = "64"))]
compile_error!("sandnet needs a 64-bit host to reserve a full 32-bit guest address space");

#[deny(dead_code, missing_docs, unused_mut)]
/// Dealing with errors, including errors across the guest boundary
pub mod error;
/// Functionality to establish and access an individual guest's linear
/// memory.
#[deny(dead_code, missing_docs, unused_mut)]
pub mod mem;
/// Counters describing which socket calls guests make and how they
/// were handled.
#[deny(dead_code, missing_docs, unused_mut)]
pub mod metrics;
/// The socket call translation layer: constant and structure
/// translation, the policy table, the dispatcher and the direct
/// intrinsics.
#[deny(dead_code, missing_docs, unused_mut)]
pub mod net;
/// The per-module-instance sandbox that an execution engine drives.
#[deny(dead_code, missing_docs, unused_mut)]
pub mod sandbox;
/// Utilities for testing including a recording host network and a
/// capturing tracing subscriber
#[deny(missing_docs, unused_mut)]
#[cfg(test)]
pub(crate) mod testing;

/// The re-export for the `SandnetError` type
pub use error::SandnetError;
/// The re-export for the `TrapKind` type
pub use error::TrapKind;
/// The re-export for the `GuestAddress` type
pub use mem::guest_addr::GuestAddress;
/// The re-export for the `GuestMemory` type
pub use mem::guest_mem::GuestMemory;
/// The re-export for the `HostNet` trait
pub use net::host::HostNet;
/// The re-export for the `LibcHostNet` type
pub use net::host::LibcHostNet;
/// The re-export for the `SocketCallDispatcher` type
pub use net::dispatch::SocketCallDispatcher;
/// The re-export for the `NetworkSandbox` type
pub use sandbox::NetworkSandbox;
/// The re-export for the `SandboxConfiguration` type
pub use sandbox::SandboxConfiguration;

/// The `Result` type used throughout sandnet
pub type Result<T> = core::result::Result<T, SandnetError>;
