/// Structures to represent an address into a guest's linear memory
pub mod guest_addr;
/// A wrapper around unsafe functionality to create and access the
/// linear memory of a guest running in a sandbox.
pub mod guest_mem;
