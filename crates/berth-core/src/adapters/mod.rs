pub mod definitions;
pub mod definitions_process;
pub(crate) mod process_utils;
pub mod runtime;
pub mod runtime_process;

pub use definitions::{DefinitionSource, EcsDefinitionSource, EcsSource, ecs_describe_request};
pub use definitions_process::ProcessEcsSource;
pub use runtime::{
    ContainerRuntime, DockerRuntime, DockerSource, StartRequest, docker_images_request,
    docker_inspect_request, docker_network_create_request, docker_ps_request, docker_pull_request,
    docker_rm_request, docker_run_request,
};
pub use runtime_process::ProcessDockerSource;

use crate::models::CoreError;

pub type AdapterResult<T> = Result<T, CoreError>;
