use std::cmp::{max, min};

use sandnet_common::abi::{GUEST_MAX_PAGES, GUEST_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SandnetError::JsonConversionFailure;
use crate::Result;

/// The complete set of configuration needed to create a
/// `NetworkSandbox`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfiguration {
    /// The size of guest memory when the module instance starts. Always
    /// a whole number of guest pages.
    pub initial_memory_size: usize,
    /// The size guest memory may grow to. Always a whole number of
    /// guest pages, and never less than `initial_memory_size`.
    pub max_memory_size: usize,
    /// The name `gethostname` reports to the guest in place of the real
    /// host's name
    pub hostname: String,
}

impl SandboxConfiguration {
    /// The default initial memory size, 16 pages
    pub const DEFAULT_INITIAL_MEMORY_SIZE: usize = 16 * GUEST_PAGE_SIZE;
    const MIN_INITIAL_MEMORY_SIZE: usize = GUEST_PAGE_SIZE;
    /// The default maximum memory size, 1024 pages
    pub const DEFAULT_MAX_MEMORY_SIZE: usize = 1024 * GUEST_PAGE_SIZE;
    const MAX_MEMORY_SIZE: usize = GUEST_MAX_PAGES * GUEST_PAGE_SIZE;
    /// The default placeholder host name
    pub const DEFAULT_HOSTNAME: &'static str = "sandboxhost";
    /// `HOST_NAME_MAX` in the guest C library
    const MAX_HOSTNAME_LEN: usize = 64;

    /// Create a new configuration. Memory sizes are rounded up to whole
    /// guest pages and clamped to what a guest can address. A missing or
    /// unusable `hostname` falls back to `DEFAULT_HOSTNAME`.
    pub fn new(
        initial_memory_size: usize,
        max_memory_size: usize,
        hostname: Option<&str>,
    ) -> Self {
        let initial_memory_size = round_to_pages(min(
            max(initial_memory_size, Self::MIN_INITIAL_MEMORY_SIZE),
            Self::MAX_MEMORY_SIZE,
        ));
        let max_memory_size = round_to_pages(min(
            max(max_memory_size, initial_memory_size),
            Self::MAX_MEMORY_SIZE,
        ));
        let hostname = match hostname {
            Some(name) if Self::valid_hostname(name) => name.to_string(),
            Some(name) => {
                warn!("Ignoring unusable placeholder host name {:?}", name);
                Self::DEFAULT_HOSTNAME.to_string()
            }
            None => Self::DEFAULT_HOSTNAME.to_string(),
        };
        Self {
            initial_memory_size,
            max_memory_size,
            hostname,
        }
    }

    /// Parse a configuration from JSON. Missing fields take their
    /// defaults, and the result is normalised as by `new`.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Self = serde_json::from_str(json).map_err(JsonConversionFailure)?;
        Ok(Self::new(
            raw.initial_memory_size,
            raw.max_memory_size,
            Some(&raw.hostname),
        ))
    }

    /// The placeholder host name
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn valid_hostname(name: &str) -> bool {
        !name.is_empty() && name.len() <= Self::MAX_HOSTNAME_LEN && !name.contains('\0')
    }
}

fn round_to_pages(size: usize) -> usize {
    size.div_ceil(GUEST_PAGE_SIZE) * GUEST_PAGE_SIZE
}

impl Default for SandboxConfiguration {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_INITIAL_MEMORY_SIZE,
            Self::DEFAULT_MAX_MEMORY_SIZE,
            None,
        )
    }
}
