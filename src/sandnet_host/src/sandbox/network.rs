use std::sync::Arc;

use tracing::{instrument, Span};

use super::config::SandboxConfiguration;
use crate::mem::guest_mem::GuestMemory;
use crate::net::dispatch::SocketCallDispatcher;
use crate::net::host::LibcHostNet;
use crate::net::intrinsics::IntrinsicRegistry;
use crate::Result;

/// The networking side of one guest module instance: its linear
/// memory, the dispatcher its `socketcall`s go to and the functions it
/// may import directly.
///
/// The execution engine calls `socketcall` and `call_intrinsic` from
/// the instance's own thread, one call at a time. Guest memory is only
/// ever grown between such calls, through `memory_mut`.
#[derive(Debug)]
pub struct NetworkSandbox {
    memory: GuestMemory,
    dispatcher: Arc<SocketCallDispatcher>,
    intrinsics: IntrinsicRegistry,
    config: SandboxConfiguration,
}

impl NetworkSandbox {
    /// Create a sandbox whose pass-through calls go to the real host
    /// through `libc`.
    #[instrument(err(Debug), skip_all, parent = Span::current(), level = "Trace")]
    pub fn new(config: SandboxConfiguration) -> Result<Self> {
        let dispatcher = SocketCallDispatcher::new(Arc::new(LibcHostNet::new()))?;
        Self::with_dispatcher(config, Arc::new(dispatcher))
    }

    /// Create a sandbox that shares `dispatcher` with other instances.
    #[instrument(err(Debug), skip_all, parent = Span::current(), level = "Trace")]
    pub fn with_dispatcher(
        config: SandboxConfiguration,
        dispatcher: Arc<SocketCallDispatcher>,
    ) -> Result<Self> {
        let memory = GuestMemory::new(config.initial_memory_size, config.max_memory_size)?;
        let intrinsics = IntrinsicRegistry::with_defaults(config.hostname());
        Ok(Self {
            memory,
            dispatcher,
            intrinsics,
            config,
        })
    }

    /// The guest's `socketcall(call, args)` syscall
    pub fn socketcall(&mut self, call: i32, args_ptr: i32) -> Result<i32> {
        self.dispatcher.dispatch(&mut self.memory, call, args_ptr)
    }

    /// A direct call from the guest to the imported function
    /// `module.name`
    pub fn call_intrinsic(&mut self, module: &str, name: &str, args: &[i32]) -> Result<i32> {
        self.intrinsics.call(&mut self.memory, module, name, args)
    }

    /// The guest's linear memory
    pub fn memory(&self) -> &GuestMemory {
        &self.memory
    }

    /// The guest's linear memory, e.g. for the engine to grow it or to
    /// place data in it
    pub fn memory_mut(&mut self) -> &mut GuestMemory {
        &mut self.memory
    }

    /// The dispatcher this sandbox's socket calls go to
    pub fn dispatcher(&self) -> &Arc<SocketCallDispatcher> {
        &self.dispatcher
    }

    /// The registry of directly imported functions, e.g. to add
    /// engine-specific ones
    pub fn intrinsics_mut(&mut self) -> &mut IntrinsicRegistry {
        &mut self.intrinsics
    }

    /// The configuration this sandbox was created with
    pub fn config(&self) -> &SandboxConfiguration {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use sandnet_common::abi::GUEST_PAGE_SIZE;
    use sandnet_common::SocketCallId;
    use sandnet_testing::arg_block;

    use super::NetworkSandbox;
    use crate::mem::guest_addr::GuestAddress;
    use crate::net::dispatch::SocketCallDispatcher;
    use crate::net::intrinsics::ENV_MODULE;
    use crate::net::policy::SyscallPolicy;
    use crate::testing::{HostCall, RecordingHostNet};
    use crate::{SandboxConfiguration, SandnetError};

    fn config() -> SandboxConfiguration {
        SandboxConfiguration::new(GUEST_PAGE_SIZE, 2 * GUEST_PAGE_SIZE, Some("unit-host"))
    }

    #[test]
    fn create() {
        let sbox = NetworkSandbox::new(config()).unwrap();
        assert_eq!(GUEST_PAGE_SIZE, sbox.memory().mem_size());
        assert_eq!(2 * GUEST_PAGE_SIZE, sbox.memory().max_size());
        assert_eq!("unit-host", sbox.config().hostname());
    }

    #[test]
    fn hostname_comes_from_config() {
        let mut sbox = NetworkSandbox::new(config()).unwrap();
        assert_eq!(
            0,
            sbox.call_intrinsic(ENV_MODULE, "gethostname", &[64, 32])
                .unwrap()
        );
        assert_eq!(
            "unit-host",
            sbox.memory().read_c_string(GuestAddress::from(64)).unwrap()
        );
    }

    #[test]
    fn grown_memory_is_usable_by_later_calls() {
        let host = RecordingHostNet::returning(4);
        let dispatcher = Arc::new(SocketCallDispatcher::new(Arc::new(host.clone())).unwrap());
        let mut sbox = NetworkSandbox::with_dispatcher(config(), dispatcher).unwrap();
        let args = GUEST_PAGE_SIZE as u32 + 0x10;
        let block = arg_block(&[9, args, 4, 0]);

        assert!(matches!(
            sbox.memory_mut().copy_from_slice(&block, GuestAddress::from(args)),
            Err(SandnetError::BoundsCheckFailed(..))
        ));
        assert_eq!(1, sbox.memory_mut().grow(1).unwrap());
        sbox.memory_mut()
            .copy_from_slice(&block, GuestAddress::from(args))
            .unwrap();
        assert_eq!(
            4,
            sbox.socketcall(SocketCallId::Send as i32, args as i32)
                .unwrap()
        );
        assert_eq!(
            vec![HostCall::Send(9, arg_block(&[9]), 0)],
            host.calls()
        );
    }

    #[test]
    fn instances_share_one_dispatcher() {
        let host = RecordingHostNet::returning(3);
        let dispatcher = Arc::new(SocketCallDispatcher::new(Arc::new(host.clone())).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                thread::spawn(move || {
                    let mut sbox = NetworkSandbox::with_dispatcher(config(), dispatcher).unwrap();
                    sbox.memory_mut()
                        .copy_from_slice(&arg_block(&[2, 2, 17]), GuestAddress::from(0x40))
                        .unwrap();
                    sbox.socketcall(SocketCallId::Socket as i32, 0x40).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(3, handle.join().unwrap());
        }
        assert_eq!(4, host.calls().len());
        assert_eq!(
            4,
            dispatcher
                .metrics()
                .calls(SocketCallId::Socket, SyscallPolicy::PassThrough)
        );
    }
}
