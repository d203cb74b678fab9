//! Cross-process arbiter enforcing per-user container quotas.
//!
//! [`inprocess::InProcessAllocator`] is the in-memory implementation; a
//! build coordinator running standalone uses it directly. [`rpc`] exposes
//! the same trait over a local TCP socket so multiple coordinator processes
//! can share one set of counts, matching `resource_allocator.port`.

pub mod inprocess;
pub mod rpc;

pub use inprocess::{InProcessAllocator, UserLimitSource};
pub use rpc::{RpcAllocatorClient, serve};
pub use zeusci_core::Allocator;
