use sandnet_common::SocketCallId;
use strum::{EnumIter, IntoStaticStr};

use super::handlers::{self, Handler};

/// What the dispatcher does with a socket call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SyscallPolicy {
    /// Translate the arguments and make the host call
    PassThrough,
    /// Return `0` without reading the arguments or calling the host
    Stub,
    /// Trap the guest as an unsupported operation
    Forbidden,
}

impl SyscallPolicy {
    /// The label used for this policy in logs and metrics
    pub fn name(self) -> &'static str {
        self.into()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Route {
    PassThrough(Handler),
    Stub,
    Forbidden,
}

impl Route {
    pub(crate) fn policy(&self) -> SyscallPolicy {
        match self {
            Route::PassThrough(_) => SyscallPolicy::PassThrough,
            Route::Stub => SyscallPolicy::Stub,
            Route::Forbidden => SyscallPolicy::Forbidden,
        }
    }
}

/// One row of the socket call table. The argument count is fixed by
/// the call itself, see `SocketCallId::arg_count`.
#[derive(Debug)]
pub(crate) struct SocketCallEntry {
    pub(crate) call: SocketCallId,
    pub(crate) route: Route,
}

impl SocketCallEntry {
    const fn new(call: SocketCallId, route: Route) -> Self {
        Self { call, route }
    }
}

// Listening and accepting are never allowed: guests are clients only.
// Rows are in sub-call number order.
static SOCKET_CALLS: [SocketCallEntry; 20] = [
    SocketCallEntry::new(SocketCallId::Socket, Route::PassThrough(handlers::socket)),
    SocketCallEntry::new(SocketCallId::Bind, Route::PassThrough(handlers::bind)),
    SocketCallEntry::new(SocketCallId::Connect, Route::PassThrough(handlers::connect)),
    SocketCallEntry::new(SocketCallId::Listen, Route::Forbidden),
    SocketCallEntry::new(SocketCallId::Accept, Route::Forbidden),
    SocketCallEntry::new(SocketCallId::GetSockName, Route::PassThrough(handlers::getsockname)),
    SocketCallEntry::new(SocketCallId::GetPeerName, Route::Stub),
    SocketCallEntry::new(SocketCallId::SocketPair, Route::Stub),
    SocketCallEntry::new(SocketCallId::Send, Route::PassThrough(handlers::send)),
    SocketCallEntry::new(SocketCallId::Recv, Route::PassThrough(handlers::recv)),
    SocketCallEntry::new(SocketCallId::SendTo, Route::PassThrough(handlers::sendto)),
    SocketCallEntry::new(SocketCallId::RecvFrom, Route::PassThrough(handlers::recvfrom)),
    SocketCallEntry::new(SocketCallId::Shutdown, Route::Stub),
    SocketCallEntry::new(SocketCallId::SetSockOpt, Route::Stub),
    SocketCallEntry::new(SocketCallId::GetSockOpt, Route::Stub),
    SocketCallEntry::new(SocketCallId::SendMsg, Route::Stub),
    SocketCallEntry::new(SocketCallId::RecvMsg, Route::Stub),
    SocketCallEntry::new(SocketCallId::Accept4, Route::Stub),
    SocketCallEntry::new(SocketCallId::RecvMmsg, Route::Stub),
    SocketCallEntry::new(SocketCallId::SendMmsg, Route::Stub),
];

pub(crate) fn lookup(call: SocketCallId) -> &'static SocketCallEntry {
    &SOCKET_CALLS[call as usize - 1]
}

/// How the dispatcher treats `call`
pub fn policy_for(call: SocketCallId) -> SyscallPolicy {
    lookup(call).route.policy()
}
