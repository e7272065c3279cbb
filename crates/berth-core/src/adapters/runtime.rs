use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::adapters::AdapterResult;
use crate::execution::{CommandSpec, ProcessSpawnRequest};
use crate::models::{ComponentId, ContainerSpec, CoreError, CoreErrorKind, Operation, PortMapping};

const DOCKER_COMMAND: &str = "docker";
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);
const MUTATE_TIMEOUT: Duration = Duration::from_secs(120);
const PULL_TIMEOUT: Duration = Duration::from_secs(900);

/// Everything a docker instance start needs, resolved ahead of the call:
/// the generated instance name and the already-rendered environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StartRequest {
    pub instance: String,
    pub image: String,
    pub network: String,
    pub environment: BTreeMap<String, String>,
    pub port_mappings: Vec<PortMapping>,
}

impl StartRequest {
    pub fn for_spec(
        spec: &ContainerSpec,
        instance: impl Into<String>,
        network: impl Into<String>,
        environment: BTreeMap<String, String>,
    ) -> Self {
        Self {
            instance: instance.into(),
            image: spec.image.clone(),
            network: network.into(),
            environment,
            port_mappings: spec.port_mappings.clone(),
        }
    }
}

/// Local container engine surface consumed by the convergence engine and the
/// command dispatchers. The engine is the sole authority on "is it running";
/// callers query it fresh on every pass instead of caching liveness.
pub trait ContainerRuntime: Send + Sync {
    fn ensure_network(&self, name: &str) -> AdapterResult<()>;

    fn is_running(&self, instance: &str) -> AdapterResult<bool>;

    fn list_running_names(&self) -> AdapterResult<BTreeSet<String>>;

    /// No-op when the instance does not exist.
    fn remove_forcefully(&self, instance: &str) -> AdapterResult<()>;

    fn pull_image(&self, image: &str) -> AdapterResult<()>;

    fn list_local_images(&self) -> AdapterResult<Vec<String>>;

    fn start(&self, request: &StartRequest) -> AdapterResult<String>;
}

pub trait DockerSource: Send + Sync {
    fn create_network(&self, name: &str) -> AdapterResult<String>;
    fn inspect_running(&self, instance: &str) -> AdapterResult<String>;
    fn list_running(&self) -> AdapterResult<String>;
    fn remove(&self, instance: &str) -> AdapterResult<String>;
    fn pull(&self, image: &str) -> AdapterResult<String>;
    fn list_images(&self) -> AdapterResult<String>;
    fn run(&self, request: &StartRequest) -> AdapterResult<String>;
}

pub struct DockerRuntime<S: DockerSource> {
    source: S,
}

impl<S: DockerSource> DockerRuntime<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: DockerSource> ContainerRuntime for DockerRuntime<S> {
    fn ensure_network(&self, name: &str) -> AdapterResult<()> {
        match self.source.create_network(name) {
            Ok(_) => Ok(()),
            Err(error) if error.message.contains("already exists") => Ok(()),
            Err(error) => Err(error),
        }
    }

    fn is_running(&self, instance: &str) -> AdapterResult<bool> {
        match self.source.inspect_running(instance) {
            Ok(raw) => parse_inspect_running(&raw),
            Err(error) if error.message.contains("No such object") => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn list_running_names(&self) -> AdapterResult<BTreeSet<String>> {
        let raw = self.source.list_running()?;
        Ok(parse_name_lines(&raw))
    }

    fn remove_forcefully(&self, instance: &str) -> AdapterResult<()> {
        match self.source.remove(instance) {
            Ok(_) => Ok(()),
            Err(error) if error.message.contains("No such container") => Ok(()),
            Err(error) => Err(error),
        }
    }

    fn pull_image(&self, image: &str) -> AdapterResult<()> {
        let _ = self.source.pull(image)?;
        Ok(())
    }

    fn list_local_images(&self) -> AdapterResult<Vec<String>> {
        let raw = self.source.list_images()?;
        Ok(parse_image_lines(&raw))
    }

    fn start(&self, request: &StartRequest) -> AdapterResult<String> {
        let raw = self.source.run(request)?;
        parse_started_container_id(&raw)?;
        Ok(request.instance.clone())
    }
}

pub fn docker_network_create_request(name: &str) -> ProcessSpawnRequest {
    docker_request(
        Operation::EnsureNetwork,
        CommandSpec::new(DOCKER_COMMAND).args(["network", "create", name]),
        MUTATE_TIMEOUT,
    )
}

pub fn docker_inspect_request(instance: &str) -> ProcessSpawnRequest {
    docker_request(
        Operation::InspectInstance,
        CommandSpec::new(DOCKER_COMMAND).args([
            "inspect",
            "--format",
            "{{.State.Running}}",
            instance,
        ]),
        QUERY_TIMEOUT,
    )
}

pub fn docker_ps_request() -> ProcessSpawnRequest {
    docker_request(
        Operation::ListRunning,
        CommandSpec::new(DOCKER_COMMAND).args(["ps", "--format", "{{.Names}}"]),
        QUERY_TIMEOUT,
    )
}

pub fn docker_rm_request(instance: &str) -> ProcessSpawnRequest {
    docker_request(
        Operation::RemoveInstance,
        CommandSpec::new(DOCKER_COMMAND).args(["rm", "--force", instance]),
        MUTATE_TIMEOUT,
    )
}

pub fn docker_pull_request(image: &str) -> ProcessSpawnRequest {
    docker_request(
        Operation::PullImage,
        CommandSpec::new(DOCKER_COMMAND).args(["pull", image]),
        PULL_TIMEOUT,
    )
}

pub fn docker_images_request() -> ProcessSpawnRequest {
    docker_request(
        Operation::ListImages,
        CommandSpec::new(DOCKER_COMMAND).args([
            "images",
            "--format",
            "{{.Repository}}:{{.Tag}}",
        ]),
        QUERY_TIMEOUT,
    )
}

pub fn docker_run_request(request: &StartRequest) -> ProcessSpawnRequest {
    let mut command = CommandSpec::new(DOCKER_COMMAND).args([
        "run",
        "--detach",
        "--name",
        request.instance.as_str(),
        "--network",
        request.network.as_str(),
    ]);

    for (key, value) in &request.environment {
        command = command.arg("--env").arg(format!("{key}={value}"));
    }

    for mapping in &request.port_mappings {
        command = command
            .arg("--publish")
            .arg(format!("{}:{}", mapping.host_port, mapping.container_port));
    }

    command = command.arg(request.image.as_str());

    docker_request(Operation::StartInstance, command, MUTATE_TIMEOUT)
}

fn docker_request(
    operation: Operation,
    command: CommandSpec,
    timeout: Duration,
) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(ComponentId::Docker, operation, command).timeout(timeout)
}

fn parse_inspect_running(output: &str) -> AdapterResult<bool> {
    match output.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(CoreError {
            component: Some(ComponentId::Docker),
            operation: Some(Operation::InspectInstance),
            task: None,
            kind: CoreErrorKind::ParseFailure,
            message: format!("unexpected inspect output '{other}'"),
        }),
    }
}

fn parse_name_lines(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_image_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("<none>"))
        .map(str::to_string)
        .collect()
}

fn parse_started_container_id(output: &str) -> AdapterResult<String> {
    let id = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    if id.is_empty() {
        return Err(CoreError {
            component: Some(ComponentId::Docker),
            operation: Some(Operation::StartInstance),
            task: None,
            kind: CoreErrorKind::ParseFailure,
            message: "docker run produced no container id".to_string(),
        });
    }

    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{
        StartRequest, docker_images_request, docker_inspect_request, docker_ps_request,
        docker_run_request, parse_image_lines, parse_inspect_running, parse_name_lines,
        parse_started_container_id,
    };
    use crate::models::{ComponentId, Operation, PortMapping};

    const PS_FIXTURE: &str = include_str!("../../tests/fixtures/docker/ps_names.txt");
    const IMAGES_FIXTURE: &str = include_str!("../../tests/fixtures/docker/images.txt");

    #[test]
    fn parses_running_names_from_ps_output() {
        let names = parse_name_lines(PS_FIXTURE);
        assert!(names.contains("web-app-1754000000000"));
        assert!(names.contains("web-cache-1754000000000"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn parses_image_list_and_skips_untagged() {
        let images = parse_image_lines(IMAGES_FIXTURE);
        assert_eq!(
            images,
            vec!["example/app:1.4.2", "postgres:16", "redis:7-alpine"]
        );
    }

    #[test]
    fn parses_inspect_liveness() {
        assert!(parse_inspect_running("true\n").unwrap());
        assert!(!parse_inspect_running("false\n").unwrap());
        assert!(parse_inspect_running("flase").is_err());
    }

    #[test]
    fn started_container_id_requires_output() {
        let id = parse_started_container_id("4f5e6d\n").unwrap();
        assert_eq!(id, "4f5e6d");
        assert!(parse_started_container_id("\n").is_err());
    }

    #[test]
    fn inspect_request_has_expected_shape() {
        let request = docker_inspect_request("web-app-1");
        assert_eq!(request.component, ComponentId::Docker);
        assert_eq!(request.operation, Operation::InspectInstance);
        assert_eq!(request.command.program.to_str(), Some("docker"));
        assert_eq!(
            request.command.args,
            vec!["inspect", "--format", "{{.State.Running}}", "web-app-1"]
        );
    }

    #[test]
    fn ps_and_images_requests_have_expected_shape() {
        assert_eq!(
            docker_ps_request().command.args,
            vec!["ps", "--format", "{{.Names}}"]
        );
        assert_eq!(
            docker_images_request().command.args,
            vec!["images", "--format", "{{.Repository}}:{{.Tag}}"]
        );
    }

    #[test]
    fn run_request_renders_env_ports_and_network() {
        let mut environment = BTreeMap::new();
        environment.insert("DATABASE_URL".to_string(), "postgres://db/app".to_string());

        let request = docker_run_request(&StartRequest {
            instance: "web-app-42".to_string(),
            image: "example/app:1.4.2".to_string(),
            network: "berth".to_string(),
            environment,
            port_mappings: vec![PortMapping {
                container_port: 8000,
                host_port: 80,
            }],
        });

        assert_eq!(
            request.command.args,
            vec![
                "run",
                "--detach",
                "--name",
                "web-app-42",
                "--network",
                "berth",
                "--env",
                "DATABASE_URL=postgres://db/app",
                "--publish",
                "80:8000",
                "example/app:1.4.2",
            ]
        );
    }
}
