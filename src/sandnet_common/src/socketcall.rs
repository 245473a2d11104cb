use strum::{EnumCount, EnumIter, FromRepr, IntoStaticStr};

/// A networking operation multiplexed through the guest's
/// `socketcall` syscall. The discriminants are the sub-call numbers
/// the guest C library passes as the first `socketcall` argument.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumCount, EnumIter, FromRepr, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[repr(i32)]
pub enum SocketCallId {
    Socket = 1,
    Bind = 2,
    Connect = 3,
    Listen = 4,
    Accept = 5,
    GetSockName = 6,
    GetPeerName = 7,
    SocketPair = 8,
    Send = 9,
    Recv = 10,
    SendTo = 11,
    RecvFrom = 12,
    Shutdown = 13,
    SetSockOpt = 14,
    GetSockOpt = 15,
    SendMsg = 16,
    RecvMsg = 17,
    Accept4 = 18,
    RecvMmsg = 19,
    SendMmsg = 20,
}

impl SocketCallId {
    /// Look up a call by the raw number the guest passed, returning
    /// `None` for anything outside the known set.
    pub fn from_raw(call: i32) -> Option<Self> {
        Self::from_repr(call)
    }

    /// Number of 32-bit words in the argument block for this call
    pub const fn arg_count(self) -> usize {
        match self {
            Self::Listen | Self::Shutdown => 2,
            Self::Socket
            | Self::Bind
            | Self::Connect
            | Self::Accept
            | Self::GetSockName
            | Self::GetPeerName
            | Self::SendMsg
            | Self::RecvMsg => 3,
            Self::SocketPair | Self::Send | Self::Recv | Self::Accept4 | Self::SendMmsg => 4,
            Self::SetSockOpt | Self::GetSockOpt | Self::RecvMmsg => 5,
            Self::SendTo | Self::RecvFrom => 6,
        }
    }

    /// The C name of the call, used in diagnostics
    pub fn name(self) -> &'static str {
        self.into()
    }
}
