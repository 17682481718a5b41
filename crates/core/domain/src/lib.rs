pub mod data;
pub mod event;
pub mod lifecycle;
pub mod log;

pub use data::{EventFields, VariableUpdate};
pub use event::{EventError, EventKind, InboundEvent, DISCRIMINATOR};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use log::LogRecord;
