/// The argument block of a socket call
pub mod args;
/// Guest to host translation of socket constants
pub mod consts;
/// The `socketcall` entry point
pub mod dispatch;
/// Pass-through handlers for the calls that reach the host
pub(crate) mod handlers;
/// The outbound host socket interface and its `libc` implementation
pub mod host;
/// Functions the guest imports directly rather than through
/// `socketcall`
pub mod intrinsics;
/// Which socket calls pass through, which are stubbed and which trap
pub mod policy;
/// Guest and host `sockaddr` layouts
pub mod sockaddr;
