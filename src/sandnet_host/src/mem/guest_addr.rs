use std::fmt;

use crate::error::SandnetError::CheckedAddOverflow;
use crate::Result;

/// An address in a guest's linear memory, as the guest sees it.
///
/// Guests are 32-bit, so every address they hand the host is a 32-bit
/// offset from the start of their memory. Use this type to distinguish
/// such an offset from a host pointer or an arbitrary integer. The
/// address says nothing about whether it is in bounds; that is only
/// decided by `GuestMemory` at the moment of access.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct GuestAddress(u32);

impl GuestAddress {
    /// Get the address representing `0`
    pub fn zero() -> Self {
        Self::default()
    }

    /// Reinterpret a raw `i32` argument from the guest as an address.
    ///
    /// Guest code passes addresses through signed integer slots, so
    /// the bits are taken as-is.
    pub fn from_guest_i32(raw: i32) -> Self {
        Self(raw as u32)
    }

    /// The raw value as the guest sees it
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Add `len` bytes to this address, failing instead of wrapping
    /// past the end of the 32-bit guest address space.
    pub fn checked_add(self, len: u64) -> Result<GuestAddress> {
        u64::from(self.0)
            .checked_add(len)
            .and_then(|sum| u32::try_from(sum).ok())
            .map(GuestAddress)
            .ok_or(CheckedAddOverflow(self.0, len))
    }
}

impl From<u32> for GuestAddress {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl From<GuestAddress> for u32 {
    fn from(val: GuestAddress) -> u32 {
        val.0
    }
}

impl From<GuestAddress> for u64 {
    fn from(val: GuestAddress) -> u64 {
        u64::from(val.0)
    }
}

impl TryFrom<usize> for GuestAddress {
    type Error = crate::SandnetError;
    fn try_from(val: usize) -> Result<GuestAddress> {
        Ok(GuestAddress(u32::try_from(val)?))
    }
}

impl From<GuestAddress> for usize {
    fn from(val: GuestAddress) -> usize {
        // usize is at least 32 bits on every host we support
        val.0 as usize
    }
}

impl fmt::Display for GuestAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
