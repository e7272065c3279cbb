use std::sync::Arc;

use crate::adapters::AdapterResult;
use crate::adapters::process_utils::run_and_collect_stdout;
use crate::adapters::runtime::{
    DockerSource, StartRequest, docker_images_request, docker_inspect_request,
    docker_network_create_request, docker_ps_request, docker_pull_request, docker_rm_request,
    docker_run_request,
};
use crate::execution::ProcessExecutor;

pub struct ProcessDockerSource {
    executor: Arc<dyn ProcessExecutor>,
}

impl ProcessDockerSource {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self { executor }
    }
}

impl DockerSource for ProcessDockerSource {
    fn create_network(&self, name: &str) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), docker_network_create_request(name))
    }

    fn inspect_running(&self, instance: &str) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), docker_inspect_request(instance))
    }

    fn list_running(&self) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), docker_ps_request())
    }

    fn remove(&self, instance: &str) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), docker_rm_request(instance))
    }

    fn pull(&self, image: &str) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), docker_pull_request(image))
    }

    fn list_images(&self) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), docker_images_request())
    }

    fn run(&self, request: &StartRequest) -> AdapterResult<String> {
        run_and_collect_stdout(self.executor.as_ref(), docker_run_request(request))
    }
}
