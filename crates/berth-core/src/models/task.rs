use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One locally tracked instantiation of a task family: spec name to the name
/// of the instance last started for it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub family: String,
    #[serde(default)]
    pub containers: BTreeMap<String, String>,
}

/// The serialized desired-state document. Loaded fresh from the remote copy
/// at the start of every locked cycle; never cached across invocations.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskRecord>,
}
