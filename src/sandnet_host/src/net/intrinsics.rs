use std::collections::HashMap;
use std::fmt;

use tracing::{debug, instrument, Span};

use crate::error::SandnetError::{
    HostFunctionNotFound, UnexpectedNoOfArguments, UnsupportedOperation,
};
use crate::log_then_return;
use crate::mem::guest_addr::GuestAddress;
use crate::mem::guest_mem::GuestMemory;
use crate::Result;

/// The guest module that ordinary C library imports come from
pub const ENV_MODULE: &str = "env";
/// The guest module that WASI socket imports come from
pub const WASI_MODULE: &str = "wasi";

/// A host implementation of a function the guest imports directly.
/// It receives the guest's raw integer arguments.
pub type IntrinsicFn = Box<dyn Fn(&mut GuestMemory, &[i32]) -> Result<i32> + Send + Sync>;

struct Intrinsic {
    arity: usize,
    func: IntrinsicFn,
}

/// Networking imports that would bypass `socketcall`. Guests that link
/// against them must fail loudly rather than run without a network.
const UNSUPPORTED: &[(&str, &str, usize)] = &[
    (ENV_MODULE, "socket", 3),
    (ENV_MODULE, "bind", 3),
    (ENV_MODULE, "listen", 2),
    (ENV_MODULE, "setsockopt", 5),
    (ENV_MODULE, "accept", 3),
    (ENV_MODULE, "inet_addr", 1),
    (ENV_MODULE, "connect", 3),
    (ENV_MODULE, "recvfrom", 6),
    (ENV_MODULE, "sendto", 6),
    (ENV_MODULE, "inet_ntoa", 1),
    (ENV_MODULE, "getprotobyname", 1),
    (ENV_MODULE, "getservbyname", 2),
    (ENV_MODULE, "gethostbyaddr", 3),
    (ENV_MODULE, "getservbyport", 2),
    (ENV_MODULE, "getsockname", 3),
    (ENV_MODULE, "atoi", 1),
    (ENV_MODULE, "htons", 1),
    (ENV_MODULE, "ntohl", 1),
    (ENV_MODULE, "ntohs", 1),
    (ENV_MODULE, "htonl", 1),
    (ENV_MODULE, "inet_aton", 2),
    (ENV_MODULE, "shutdown", 2),
    (ENV_MODULE, "inet_pton", 3),
    (ENV_MODULE, "inet_ntop", 4),
    (ENV_MODULE, "recv", 4),
    (ENV_MODULE, "send", 4),
    (ENV_MODULE, "getsockopt", 5),
    (WASI_MODULE, "sock_accept", 3),
    (WASI_MODULE, "sock_send", 5),
    (WASI_MODULE, "sock_recv", 6),
    (WASI_MODULE, "sock_shutdown", 2),
];

/// The functions a guest may import directly, keyed by module and name.
#[derive(Default)]
pub struct IntrinsicRegistry {
    funcs: HashMap<(String, String), Intrinsic>,
}

impl IntrinsicRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `gethostname` (answering with `hostname`),
    /// `gethostbyname`, and a trapping entry for every other
    /// networking import.
    pub fn with_defaults(hostname: &str) -> Self {
        let mut registry = Self::new();
        let hostname = hostname.to_string();
        registry.register(
            ENV_MODULE,
            "gethostname",
            2,
            Box::new(move |mem: &mut GuestMemory, args: &[i32]| {
                gethostname(&hostname, mem, args[0], args[1])
            }),
        );
        registry.register(
            ENV_MODULE,
            "gethostbyname",
            1,
            Box::new(|mem: &mut GuestMemory, args: &[i32]| gethostbyname(mem, args[0])),
        );
        for (module, name, arity) in UNSUPPORTED {
            registry.register_unsupported(module, name, *arity);
        }
        registry
    }

    /// Register `func` as `module.name`, replacing any previous entry.
    /// `func` is only ever called with exactly `arity` arguments.
    pub fn register(&mut self, module: &str, name: &str, arity: usize, func: IntrinsicFn) {
        self.funcs.insert(
            (module.to_string(), name.to_string()),
            Intrinsic { arity, func },
        );
    }

    /// Register `module.name` as an import that traps whenever it is
    /// called.
    pub fn register_unsupported(&mut self, module: &str, name: &str, arity: usize) {
        let qualified = format!("{}.{}", module, name);
        self.register(
            module,
            name,
            arity,
            Box::new(move |_: &mut GuestMemory, _: &[i32]| -> Result<i32> {
                log_then_return!(UnsupportedOperation(qualified.clone()));
            }),
        );
    }

    /// Whether `module.name` is registered
    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.funcs
            .contains_key(&(module.to_string(), name.to_string()))
    }

    /// Call `module.name` with `args` against `mem`.
    #[instrument(err(Debug), skip(self, mem), parent = Span::current(), level = "Trace")]
    pub fn call(
        &self,
        mem: &mut GuestMemory,
        module: &str,
        name: &str,
        args: &[i32],
    ) -> Result<i32> {
        let intrinsic = match self.funcs.get(&(module.to_string(), name.to_string())) {
            Some(intrinsic) => intrinsic,
            None => log_then_return!(HostFunctionNotFound(format!("{}.{}", module, name))),
        };
        if args.len() != intrinsic.arity {
            log_then_return!(UnexpectedNoOfArguments(args.len(), intrinsic.arity));
        }
        (intrinsic.func)(mem, args)
    }
}

impl fmt::Debug for IntrinsicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self
            .funcs
            .keys()
            .map(|(module, name)| format!("{}.{}", module, name))
            .collect();
        names.sort();
        f.debug_struct("IntrinsicRegistry")
            .field("funcs", &names)
            .finish()
    }
}

/// `int gethostname(char *buf, size_t len)`, answered with the
/// sandbox's placeholder name instead of the real host's.
///
/// This is a C library import rather than a raw syscall, so failure is
/// a plain `-1`, never a negated errno.
fn gethostname(hostname: &str, mem: &mut GuestMemory, buf: i32, len: i32) -> Result<i32> {
    let buf = GuestAddress::from_guest_i32(buf);
    let len = len as u32 as usize;
    debug!("S - gethostname - {} {}", buf, len);

    let dst = mem.slice_mut(buf, len)?;
    let name = hostname.as_bytes();
    if dst.len() <= name.len() {
        return Ok(-1);
    }
    dst[..name.len()].copy_from_slice(name);
    dst[name.len()] = 0;
    Ok(0)
}

/// `struct hostent *gethostbyname(const char *name)`. Names are never
/// resolved; the guest always gets a null result.
fn gethostbyname(mem: &mut GuestMemory, name: i32) -> Result<i32> {
    let name = mem.read_c_string(GuestAddress::from_guest_i32(name))?;
    debug!("S - gethostbyname - {}", name);
    Ok(0)
}
