/// Configuration needed to establish a sandbox.
pub mod config;
/// Functionality for creating a sandbox and routing a guest's
/// networking calls through it
pub mod network;

/// Re-export for `SandboxConfiguration` type
pub use config::SandboxConfiguration;
/// Re-export for `NetworkSandbox` type
pub use network::NetworkSandbox;
