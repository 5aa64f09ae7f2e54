//! Software device for exercising `rendercopy` batches without hardware.
//!
//! [`SimDevice`] owns buffer objects placed in a simulated graphics address space, resolves the
//! relocations of submitted batches and runs them through a reference [`Executor`] that performs
//! the copy the command stream describes.

pub mod device;
pub mod error;
pub mod exec;
pub mod memory;
pub mod tiling;

pub use device::SimDevice;
pub use error::{ExecError, MemoryError, SimError};
pub use exec::{ExecStats, Executor};
pub use memory::{DomainState, GpuMemory, Gtt};
