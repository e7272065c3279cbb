use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::models::{ComponentId, Operation};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    NotFound,
    InvalidInput,
    CyclicDependency,
    ParseFailure,
    Timeout,
    ProcessFailure,
    StorageFailure,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoreError {
    pub component: Option<ComponentId>,
    pub operation: Option<Operation>,
    pub task: Option<String>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for CoreError {}
