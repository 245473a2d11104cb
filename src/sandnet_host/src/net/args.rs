use std::fmt;

use sandnet_common::SocketCallId;
use tracing::{instrument, Span};

use crate::error::SandnetError::UnexpectedNoOfArguments;
use crate::mem::guest_addr::GuestAddress;
use crate::mem::guest_mem::GuestMemory;
use crate::Result;

/// The argument words of one `socketcall`, copied out of guest memory.
///
/// The block is read exactly once per call, for exactly as many words
/// as the call takes. Handlers only ever see this copy, so later guest
/// writes to the block cannot change the arguments mid-call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentBlock {
    call: SocketCallId,
    words: Vec<u32>,
}

impl ArgumentBlock {
    /// Read the argument block for `call` starting at `addr`.
    #[instrument(err(Debug), skip(mem), parent = Span::current(), level = "Trace")]
    pub fn read(mem: &GuestMemory, call: SocketCallId, addr: GuestAddress) -> Result<Self> {
        let words = mem.read::<u32>(addr, call.arg_count())?;
        Ok(Self { call, words })
    }

    /// The call these arguments belong to
    pub fn call(&self) -> SocketCallId {
        self.call
    }

    /// The raw words
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// The `i`th word, unsigned
    pub fn word(&self, i: usize) -> Result<u32> {
        match self.words.get(i) {
            Some(word) => Ok(*word),
            None => Err(UnexpectedNoOfArguments(self.words.len(), i + 1)),
        }
    }

    /// The `i`th word as a signed integer, e.g. a descriptor or flags
    pub fn int(&self, i: usize) -> Result<i32> {
        Ok(self.word(i)? as i32)
    }

    /// The `i`th word as a guest address
    pub fn addr(&self, i: usize) -> Result<GuestAddress> {
        Ok(GuestAddress::from(self.word(i)?))
    }

    /// The `i`th word as a byte length
    pub fn len(&self, i: usize) -> Result<usize> {
        Ok(usize::try_from(self.word(i)?)?)
    }
}

impl fmt::Display for ArgumentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", word)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sandnet_common::SocketCallId;
    use sandnet_testing::arg_block;

    use super::ArgumentBlock;
    use crate::mem::guest_addr::GuestAddress;
    use crate::mem::guest_mem::GuestMemory;
    use crate::SandnetError;

    #[test]
    fn reads_exactly_arg_count_words() {
        let mut mem = GuestMemory::new(64, 64).unwrap();
        // six words fit, but send only takes four
        mem.copy_from_slice(&arg_block(&[3, 0x1000, 10, 0, 7, 7]), GuestAddress::from(40))
            .unwrap();
        let args = ArgumentBlock::read(&mem, SocketCallId::Send, GuestAddress::from(40)).unwrap();
        assert_eq!(&[3, 0x1000, 10, 0], args.words());
        assert_eq!("3 4096 10 0", args.to_string());
        assert!(matches!(
            args.word(4),
            Err(SandnetError::UnexpectedNoOfArguments(4, 5))
        ));

        // sendto needs 24 bytes from 48, which runs past the end
        assert!(matches!(
            ArgumentBlock::read(&mem, SocketCallId::SendTo, GuestAddress::from(48)),
            Err(SandnetError::BoundsCheckFailed(48, 24, 64))
        ));
    }

    #[test]
    fn typed_views() {
        let mut mem = GuestMemory::new(64, 64).unwrap();
        mem.copy_from_slice(&arg_block(&[u32::MAX, 0x20, 5]), GuestAddress::zero())
            .unwrap();
        let args = ArgumentBlock::read(&mem, SocketCallId::Bind, GuestAddress::zero()).unwrap();
        assert_eq!(SocketCallId::Bind, args.call());
        assert_eq!(-1, args.int(0).unwrap());
        assert_eq!(GuestAddress::from(0x20), args.addr(1).unwrap());
        assert_eq!(5, args.len(2).unwrap());
    }
}
