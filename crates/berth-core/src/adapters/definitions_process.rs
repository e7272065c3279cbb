use std::sync::Arc;

use crate::adapters::AdapterResult;
use crate::adapters::definitions::{EcsSource, ecs_describe_request};
use crate::adapters::process_utils::run_and_collect_stdout;
use crate::execution::ProcessExecutor;

pub struct ProcessEcsSource {
    executor: Arc<dyn ProcessExecutor>,
}

impl ProcessEcsSource {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self { executor }
    }
}

impl EcsSource for ProcessEcsSource {
    fn describe_task_definition(&self, family: &str) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), ecs_describe_request(family))
    }
}
