//! Process lifecycle: the control loop, its scheduler and signal sources.

pub mod control;
pub mod scheduler;
#[cfg(unix)]
pub mod signals;

pub use control::{ConfigSource, ControlCommand, ControlHandle, ControlPlane, ServerHandle};
pub use scheduler::CollectionScheduler;
