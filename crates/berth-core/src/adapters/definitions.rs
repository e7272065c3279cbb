use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde_json::Value;

use crate::adapters::AdapterResult;
use crate::execution::{CommandSpec, ProcessSpawnRequest};
use crate::models::{ComponentId, ContainerSpec, CoreError, CoreErrorKind, Operation, PortMapping};

const AWS_COMMAND: &str = "aws";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolves a task family name into the ordered container specs that define
/// it. Lookup failure is fatal for the calling command.
pub trait DefinitionSource: Send + Sync {
    fn resolve(&self, family: &str) -> AdapterResult<Vec<ContainerSpec>>;
}

pub trait EcsSource: Send + Sync {
    fn describe_task_definition(&self, family: &str) -> AdapterResult<String>;
}

pub struct EcsDefinitionSource<S: EcsSource> {
    source: S,
}

impl<S: EcsSource> EcsDefinitionSource<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: EcsSource> DefinitionSource for EcsDefinitionSource<S> {
    fn resolve(&self, family: &str) -> AdapterResult<Vec<ContainerSpec>> {
        let raw = self.source.describe_task_definition(family)?;
        parse_task_definition(&raw)
    }
}

pub fn ecs_describe_request(family: &str) -> ProcessSpawnRequest {
    ProcessSpawnRequest::new(
        ComponentId::EcsDefinitions,
        Operation::ResolveFamily,
        CommandSpec::new(AWS_COMMAND).args([
            "ecs",
            "describe-task-definition",
            "--task-definition",
            family,
            "--output",
            "json",
        ]),
    )
    .timeout(RESOLVE_TIMEOUT)
}

fn parse_task_definition(output: &str) -> AdapterResult<Vec<ContainerSpec>> {
    let json: Value = serde_json::from_str(output.trim())
        .map_err(|error| parse_error(format!("invalid task definition JSON: {error}")))?;

    let definitions = json
        .get("taskDefinition")
        .and_then(|definition| definition.get("containerDefinitions"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            parse_error("task definition JSON is missing 'containerDefinitions'".to_string())
        })?;

    let mut specs = Vec::with_capacity(definitions.len());
    for entry in definitions {
        specs.push(parse_container_definition(entry)?);
    }

    validate_links(&specs)?;
    Ok(specs)
}

fn parse_container_definition(entry: &Value) -> AdapterResult<ContainerSpec> {
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| parse_error("container definition is missing 'name'".to_string()))?;

    let image = entry
        .get("image")
        .and_then(Value::as_str)
        .filter(|image| !image.is_empty())
        .ok_or_else(|| {
            parse_error(format!("container definition '{name}' is missing 'image'"))
        })?;

    let mut environment = BTreeMap::new();
    if let Some(pairs) = entry.get("environment").and_then(Value::as_array) {
        for pair in pairs {
            let key = pair.get("name").and_then(Value::as_str).unwrap_or_default();
            if key.is_empty() {
                continue;
            }
            let value = pair
                .get("value")
                .and_then(Value::as_str)
                .unwrap_or_default();
            environment.insert(key.to_string(), value.to_string());
        }
    }

    let mut port_mappings = Vec::new();
    if let Some(mappings) = entry.get("portMappings").and_then(Value::as_array) {
        for mapping in mappings {
            let container_port = parse_port(mapping.get("containerPort"), name)?;
            let host_port = match mapping.get("hostPort") {
                Some(value) => parse_port(Some(value), name)?,
                None => container_port,
            };
            port_mappings.push(PortMapping {
                container_port,
                host_port,
            });
        }
    }

    let links = entry
        .get("links")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ContainerSpec {
        name: name.to_string(),
        image: image.to_string(),
        environment,
        port_mappings,
        links,
    })
}

fn parse_port(value: Option<&Value>, container: &str) -> AdapterResult<u16> {
    let number = value.and_then(Value::as_u64).ok_or_else(|| {
        parse_error(format!("container definition '{container}' has a non-numeric port"))
    })?;

    u16::try_from(number).map_err(|_| {
        parse_error(format!(
            "container definition '{container}' port {number} is out of range"
        ))
    })
}

fn validate_links(specs: &[ContainerSpec]) -> AdapterResult<()> {
    let names: BTreeSet<&str> = specs.iter().map(|spec| spec.name.as_str()).collect();

    for spec in specs {
        for link in &spec.links {
            if !names.contains(link.as_str()) {
                return Err(CoreError {
                    component: Some(ComponentId::EcsDefinitions),
                    operation: Some(Operation::ResolveFamily),
                    task: None,
                    kind: CoreErrorKind::InvalidInput,
                    message: format!(
                        "container '{}' links to unknown container '{link}'",
                        spec.name
                    ),
                });
            }
        }
    }

    Ok(())
}

fn parse_error(message: String) -> CoreError {
    CoreError {
        component: Some(ComponentId::EcsDefinitions),
        operation: Some(Operation::ResolveFamily),
        task: None,
        kind: CoreErrorKind::ParseFailure,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::{ecs_describe_request, parse_task_definition};
    use crate::models::{ComponentId, CoreErrorKind, Operation, PortMapping};

    const FAMILY_FIXTURE: &str =
        include_str!("../../tests/fixtures/ecs/describe_task_definition.json");

    #[test]
    fn parses_family_fixture() {
        let specs = parse_task_definition(FAMILY_FIXTURE).unwrap();
        assert_eq!(specs.len(), 3);

        assert_eq!(specs[0].name, "cache");
        assert_eq!(specs[0].image, "redis:7-alpine");
        assert!(specs[0].links.is_empty());

        assert_eq!(specs[1].name, "db");
        assert_eq!(
            specs[1].port_mappings,
            vec![PortMapping {
                container_port: 5432,
                host_port: 5432,
            }]
        );

        assert_eq!(specs[2].name, "app");
        assert_eq!(specs[2].links, vec!["db", "cache"]);
        assert_eq!(
            specs[2].environment.get("DATABASE_HOST").map(String::as_str),
            Some("{db}")
        );
        assert_eq!(
            specs[2].port_mappings,
            vec![PortMapping {
                container_port: 8000,
                host_port: 80,
            }]
        );
    }

    #[test]
    fn rejects_unknown_link_target() {
        let raw = r#"{
            "taskDefinition": {
                "containerDefinitions": [
                    {"name": "app", "image": "example/app:1", "links": ["db"]}
                ]
            }
        }"#;
        let error = parse_task_definition(raw).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::InvalidInput);
        assert!(error.message.contains("unknown container 'db'"));
    }

    #[test]
    fn rejects_missing_image() {
        let raw = r#"{
            "taskDefinition": {
                "containerDefinitions": [{"name": "app"}]
            }
        }"#;
        let error = parse_task_definition(raw).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::ParseFailure);
    }

    #[test]
    fn rejects_out_of_range_port() {
        let raw = r#"{
            "taskDefinition": {
                "containerDefinitions": [
                    {"name": "app", "image": "a", "portMappings": [{"containerPort": 70000}]}
                ]
            }
        }"#;
        let error = parse_task_definition(raw).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::ParseFailure);
        assert!(error.message.contains("out of range"));
    }

    #[test]
    fn describe_request_has_expected_shape() {
        let request = ecs_describe_request("web");
        assert_eq!(request.component, ComponentId::EcsDefinitions);
        assert_eq!(request.operation, Operation::ResolveFamily);
        assert_eq!(request.command.program.to_str(), Some("aws"));
        assert_eq!(
            request.command.args,
            vec![
                "ecs",
                "describe-task-definition",
                "--task-definition",
                "web",
                "--output",
                "json",
            ]
        );
    }
}
