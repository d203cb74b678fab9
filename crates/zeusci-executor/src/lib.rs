//! Container lifecycle and process execution for the Zeus CI pipeline
//! engine.
//!
//! Two layers, matching the split the scheduler expects:
//! - [`process`]: spawn external commands and capture output.
//! - [`docker`]: one [`zeusci_core::executor::Container`] per running stage,
//!   built on `bollard` for lifecycle and the process layer for exec/copy.

pub mod docker;
pub mod process;

pub use docker::{DockerContainer, DockerContainerFactory};
pub use process::ProcessExecutor;
pub use zeusci_core::executor::{Container, ContainerFactory, ContainerSpec, ProcessOutput};
