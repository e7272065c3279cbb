pub mod component;
pub mod error;
pub mod spec;
pub mod task;

pub use component::{ComponentId, Operation};
pub use error::{CoreError, CoreErrorKind};
pub use spec::{ContainerSpec, PortMapping};
pub use task::{TaskRecord, TaskState};
