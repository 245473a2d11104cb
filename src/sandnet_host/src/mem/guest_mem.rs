use std::ffi::c_void;
use std::io::{Cursor, Error};
use std::mem::size_of;
use std::ops::Range;
use std::ptr::null_mut;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use libc::{mmap, munmap};
use sandnet_common::abi::{GUEST_MAX_PAGES, GUEST_PAGE_SIZE};
use tracing::{instrument, Span};

use super::guest_addr::GuestAddress;
use crate::error::SandnetError::{
    BoundsCheckFailed, IOError, InvalidGuestString, MemoryRequestTooBig, MmapFailed,
};
use crate::log_then_return;
use crate::Result;

macro_rules! bounds_check {
    ($addr:expr, $len:expr, $size:expr) => {
        if u64::from($addr).saturating_add($len as u64) > $size as u64 {
            log_then_return!(BoundsCheckFailed(u64::from($addr), $len, $size));
        }
    };
}

/// A `std::io::Cursor` for reading byte slices
type ByteSliceCursor<'a> = Cursor<&'a [u8]>;

/// A fixed-width value that can live in guest memory.
///
/// Guest linear memory is little-endian regardless of the host.
pub trait GuestValue: Copy + Sized {
    /// Number of bytes the value occupies in guest memory
    const SIZE: usize;
    /// Decode one value from `c`, advancing it
    fn read_le(c: &mut ByteSliceCursor<'_>) -> std::io::Result<Self>;
    /// Append the guest encoding of `self` to `out`
    fn write_le(self, out: &mut Vec<u8>) -> std::io::Result<()>;
}

impl GuestValue for u8 {
    const SIZE: usize = 1;
    fn read_le(c: &mut ByteSliceCursor<'_>) -> std::io::Result<Self> {
        c.read_u8()
    }
    fn write_le(self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.write_u8(self)
    }
}

macro_rules! guest_value {
    ($t:ty, $read:ident, $write:ident) => {
        impl GuestValue for $t {
            const SIZE: usize = size_of::<$t>();
            fn read_le(c: &mut ByteSliceCursor<'_>) -> std::io::Result<Self> {
                c.$read::<LittleEndian>()
            }
            fn write_le(self, out: &mut Vec<u8>) -> std::io::Result<()> {
                out.$write::<LittleEndian>(self)
            }
        }
    };
}

guest_value!(u16, read_u16, write_u16);
guest_value!(i16, read_i16, write_i16);
guest_value!(u32, read_u32, write_u32);
guest_value!(i32, read_i32, write_i32);
guest_value!(u64, read_u64, write_u64);
guest_value!(i64, read_i64, write_i64);

// GuestMemory needs to be Send so that a module instance can be moved to
// the thread that runs it. *mut c_void is not Send, so we wrap it in a
// struct that is. This is sound because the region is owned by exactly
// one GuestMemory and every access goes through &self / &mut self.

#[derive(Debug)]
/// Pointer to a mutable `c_void` object.
struct PtrCVoidMut(*mut c_void);

unsafe impl Send for PtrCVoidMut {}
unsafe impl Sync for PtrCVoidMut {}

#[derive(Debug)]
struct Reservation {
    ptr: PtrCVoidMut,
    size: usize,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        unsafe {
            munmap(self.ptr.0, self.size);
        }
    }
}

/// The linear memory of one guest module instance.
///
/// The whole address range the guest may ever grow into is reserved
/// up front, but only the first `mem_size()` bytes are addressable.
/// Every access is checked against that current size for the full
/// width of the value; nothing is ever partially read or written.
///
/// Host code never gets a raw pointer into this region. Handlers that
/// pass guest buffers to the host OS borrow them through `slice` and
/// `slice_mut`, which tie the borrow to the memory itself.
#[derive(Debug)]
pub struct GuestMemory {
    reservation: Reservation,
    size: usize,
}

impl GuestMemory {
    /// Create a new guest memory whose addressable size starts at
    /// `initial_size` bytes and may later grow up to `max_size` bytes.
    ///
    /// Return `Err` if `initial_size > max_size`, if `max_size` is
    /// larger than a 32-bit guest can address, or if the region
    /// could not be reserved.
    #[instrument(err(Debug), parent = Span::current(), level = "Trace")]
    pub fn new(initial_size: usize, max_size: usize) -> Result<Self> {
        let addressable = GUEST_MAX_PAGES * GUEST_PAGE_SIZE;
        if max_size > addressable {
            log_then_return!(MemoryRequestTooBig(max_size, addressable));
        }
        if initial_size > max_size {
            log_then_return!(MemoryRequestTooBig(initial_size, max_size));
        }
        // https://docs.rs/libc/latest/libc/fn.mmap.html
        let addr = unsafe {
            mmap(
                null_mut(),
                max_size as libc::size_t,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE | libc::MAP_NORESERVE,
                -1 as libc::c_int,
                0 as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED || addr.is_null() {
            log_then_return!(MmapFailed(Error::last_os_error().raw_os_error()));
        }
        Ok(Self {
            reservation: Reservation {
                ptr: PtrCVoidMut(addr),
                size: max_size,
            },
            size: initial_size,
        })
    }

    /// Return the number of bytes the guest can currently address.
    pub fn mem_size(&self) -> usize {
        self.size
    }

    /// Return the largest size this memory may grow to.
    pub fn max_size(&self) -> usize {
        self.reservation.size
    }

    /// Return the current size in whole guest pages.
    pub fn page_count(&self) -> usize {
        self.size / GUEST_PAGE_SIZE
    }

    /// Grow the addressable region by `pages` guest pages and return the
    /// page count from before the call. New pages read as zero.
    ///
    /// This must only be called between guest calls, never while a
    /// translation is in progress.
    #[instrument(err(Debug), skip(self), parent = Span::current(), level = "Trace")]
    pub fn grow(&mut self, pages: usize) -> Result<usize> {
        let old_pages = self.page_count();
        let new_size = pages
            .checked_mul(GUEST_PAGE_SIZE)
            .and_then(|delta| self.size.checked_add(delta))
            .unwrap_or(usize::MAX);
        if new_size > self.max_size() {
            log_then_return!(MemoryRequestTooBig(new_size, self.max_size()));
        }
        self.size = new_size;
        Ok(old_pages)
    }

    /// Return the byte range `[addr, addr + len)` if it lies entirely
    /// within the current memory, or `Err` otherwise.
    fn checked_range(&self, addr: GuestAddress, len: usize) -> Result<Range<usize>> {
        bounds_check!(addr, len, self.mem_size());
        let start = usize::from(addr);
        Ok(start..start + len)
    }

    /// Read `count` consecutive values of type `T` starting at `addr`.
    pub fn read<T: GuestValue>(&self, addr: GuestAddress, count: usize) -> Result<Vec<T>> {
        let len = count.saturating_mul(T::SIZE);
        let range = self.checked_range(addr, len)?;
        let mut c = Cursor::new(&self.as_slice()[range]);
        (0..count)
            .map(|_| T::read_le(&mut c).map_err(IOError))
            .collect()
    }

    /// Write all of `vals` as consecutive values starting at `addr`.
    ///
    /// If `Ok` is returned, `self` will have been modified
    /// in-place. Otherwise, no modifications will have been
    /// made.
    pub fn write<T: GuestValue>(&mut self, addr: GuestAddress, vals: &[T]) -> Result<()> {
        let len = vals.len().saturating_mul(T::SIZE);
        let range = self.checked_range(addr, len)?;
        let mut encoded = Vec::with_capacity(len);
        for val in vals {
            val.write_le(&mut encoded)?;
        }
        self.as_mut_slice()[range].copy_from_slice(&encoded);
        Ok(())
    }

    fn read_value<T: GuestValue>(&self, addr: GuestAddress) -> Result<T> {
        let range = self.checked_range(addr, T::SIZE)?;
        let mut c = Cursor::new(&self.as_slice()[range]);
        T::read_le(&mut c).map_err(IOError)
    }

    /// Read a `u16` from guest memory starting at `addr`
    pub fn read_u16(&self, addr: GuestAddress) -> Result<u16> {
        self.read_value(addr)
    }

    /// Read a `u32` from guest memory starting at `addr`
    pub fn read_u32(&self, addr: GuestAddress) -> Result<u32> {
        self.read_value(addr)
    }

    /// Read an `i32` from guest memory starting at `addr`
    pub fn read_i32(&self, addr: GuestAddress) -> Result<i32> {
        self.read_value(addr)
    }

    /// Write `val` to guest memory as little-endian at `addr`.
    pub fn write_u16(&mut self, addr: GuestAddress, val: u16) -> Result<()> {
        self.write(addr, &[val])
    }

    /// Write `val` to guest memory as little-endian at `addr`.
    pub fn write_u32(&mut self, addr: GuestAddress, val: u32) -> Result<()> {
        self.write(addr, &[val])
    }

    /// Write `val` to guest memory as little-endian at `addr`.
    pub fn write_i32(&mut self, addr: GuestAddress, val: i32) -> Result<()> {
        self.write(addr, &[val])
    }

    /// Borrow `len` bytes of guest memory starting at `addr`.
    pub fn slice(&self, addr: GuestAddress, len: usize) -> Result<&[u8]> {
        let range = self.checked_range(addr, len)?;
        Ok(&self.as_slice()[range])
    }

    /// Mutably borrow `len` bytes of guest memory starting at `addr`.
    pub fn slice_mut(&mut self, addr: GuestAddress, len: usize) -> Result<&mut [u8]> {
        let range = self.checked_range(addr, len)?;
        Ok(&mut self.as_mut_slice()[range])
    }

    /// If all memory locations within the range
    /// `[addr, addr + from_bytes.len())` are valid, copy all
    /// bytes from `from_bytes` in order to `self` and return `Ok`.
    /// Otherwise, return `Err`.
    pub fn copy_from_slice(&mut self, from_bytes: &[u8], addr: GuestAddress) -> Result<()> {
        self.slice_mut(addr, from_bytes.len())?
            .copy_from_slice(from_bytes);
        Ok(())
    }

    /// copy all of `self` in the range `[ addr, addr + slc.len() )`
    /// into `slc` and return `Ok`. If the range is invalid, return `Err`
    ///
    /// # Example usage
    ///
    /// The below will copy 20 bytes from `guest_mem` starting at
    /// the very beginning of the guest memory (address 0).
    ///
    /// ```rust
    /// # use sandnet_host::{GuestAddress, GuestMemory};
    /// let mut ret_vec = vec![b'\0'; 20];
    /// let guest_mem = GuestMemory::new(1024, 1024).unwrap();
    /// guest_mem.copy_to_slice(ret_vec.as_mut_slice(), GuestAddress::zero()).unwrap();
    /// ```
    pub fn copy_to_slice(&self, slc: &mut [u8], addr: GuestAddress) -> Result<()> {
        slc.copy_from_slice(self.slice(addr, slc.len())?);
        Ok(())
    }

    /// Read the NUL-terminated string starting at `addr`. The
    /// terminator must be inside guest memory and the bytes before it
    /// must be valid UTF-8.
    pub fn read_c_string(&self, addr: GuestAddress) -> Result<String> {
        bounds_check!(addr, 1, self.mem_size());
        let tail = &self.as_slice()[usize::from(addr)..];
        let nul = match tail.iter().position(|b| *b == 0) {
            Some(nul) => nul,
            None => log_then_return!(InvalidGuestString(u64::from(addr))),
        };
        Ok(std::str::from_utf8(&tail[..nul])?.to_string())
    }

    fn as_slice(&self) -> &[u8] {
        // safety: the reservation is at least `self.size` bytes long, is
        // owned by `self` and lives as long as the returned borrow
        unsafe { std::slice::from_raw_parts(self.reservation.ptr.0 as *const u8, self.size) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // safety: as for `as_slice`, and `&mut self` guarantees the
        // borrow is unique
        unsafe { std::slice::from_raw_parts_mut(self.reservation.ptr.0 as *mut u8, self.size) }
    }
}
