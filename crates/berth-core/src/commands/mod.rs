use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::adapters::definitions::DefinitionSource;
use crate::adapters::runtime::ContainerRuntime;
use crate::config::Config;
use crate::convergence::{Converger, Outcome};
use crate::models::{CoreError, CoreErrorKind, TaskRecord, TaskState};
use crate::store::StateStore;

pub type CommandResult = Result<Value, CoreError>;

/// Thin orchestration of store, engine, and adapters. One dispatcher per
/// process invocation; every store-touching command runs one locked cycle.
pub struct Dispatcher<'a> {
    config: &'a Config,
    store: &'a StateStore,
    runtime: &'a dyn ContainerRuntime,
    definitions: &'a dyn DefinitionSource,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a StateStore,
        runtime: &'a dyn ContainerRuntime,
        definitions: &'a dyn DefinitionSource,
    ) -> Self {
        Self {
            config,
            store,
            runtime,
            definitions,
        }
    }

    pub fn run(&self, task: Option<&str>, name: Option<&str>, restart: bool) -> CommandResult {
        self.runtime.ensure_network(&self.config.network)?;
        let converger = Converger::new(self.runtime, &self.config.network, restart);

        self.store.with_locked_state(|state| match (task, name) {
            (Some(family), Some(name)) => {
                let specs = self.definitions.resolve(family)?;
                let record = state
                    .tasks
                    .entry(name.to_string())
                    .or_insert_with(|| TaskRecord {
                        family: family.to_string(),
                        containers: BTreeMap::new(),
                    });
                let outcomes = converger.converge_task(name, family, &specs, record)?;
                Ok(run_report(name, record, &outcomes))
            }
            (None, Some(name)) => {
                let record = state
                    .tasks
                    .get_mut(name)
                    .ok_or_else(|| unknown_task(name))?;
                let family = record.family.clone();
                let specs = self.definitions.resolve(&family)?;
                let outcomes = converger.converge_task(name, &family, &specs, record)?;
                Ok(run_report(name, record, &outcomes))
            }
            (None, None) => {
                let names: Vec<String> = state.tasks.keys().cloned().collect();
                let mut reports = Vec::with_capacity(names.len());
                for name in names {
                    if let Some(record) = state.tasks.get_mut(&name) {
                        let family = record.family.clone();
                        let specs = self.definitions.resolve(&family)?;
                        let outcomes = converger.converge_task(&name, &family, &specs, record)?;
                        reports.push(run_report(&name, record, &outcomes));
                    }
                }
                Ok(Value::Array(reports))
            }
            (Some(_), None) => Err(CoreError {
                component: None,
                operation: None,
                task: None,
                kind: CoreErrorKind::InvalidInput,
                message: "a task family requires --name to select the task to run it under"
                    .to_string(),
            }),
        })
    }

    pub fn list(&self, running: bool) -> CommandResult {
        if !running {
            return self
                .store
                .read_locked_state(|state| Ok(json!(state.tasks.keys().collect::<Vec<_>>())));
        }

        let running_names = self.runtime.list_running_names()?;
        self.store.read_locked_state(|state| {
            let mut entries = Vec::new();
            for (task, record) in &state.tasks {
                for (container, instance) in &record.containers {
                    if running_names.contains(instance) {
                        entries.push(json!({
                            "family": &record.family,
                            "task": task,
                            "container": container,
                            "instance": instance,
                        }));
                    }
                }
            }
            Ok(Value::Array(entries))
        })
    }

    pub fn remove(&self, name: Option<&str>, definition: bool) -> CommandResult {
        self.store.with_locked_state(|state| {
            let selected = select_tasks(state, name)?;

            for task in &selected {
                if let Some(record) = state.tasks.get_mut(task) {
                    for instance in record.containers.values() {
                        self.runtime.remove_forcefully(instance)?;
                    }
                    record.containers.clear();
                }
            }

            if definition {
                for task in &selected {
                    state.tasks.remove(task);
                }
            }

            Ok(json!({
                "removed": selected,
                "definition": definition,
            }))
        })
    }

    pub fn pull(&self, image: Option<&str>) -> CommandResult {
        let images = match image {
            Some(image) => vec![image.to_string()],
            None => self.runtime.list_local_images()?,
        };

        for image in &images {
            self.runtime.pull_image(image)?;
        }

        Ok(json!(images))
    }
}

/// Renders a command result into the wire envelope callers parse. Logical
/// failures stay in-band; the process exit code is not part of the contract.
pub fn render_envelope(result: CommandResult) -> Value {
    match result {
        Ok(value) => json!({"status": "ok", "result": value}),
        Err(error) => {
            tracing::error!(%error, "command failed");
            json!({"status": "failed", "result": error.to_string()})
        }
    }
}

fn run_report(name: &str, record: &TaskRecord, outcomes: &BTreeMap<String, Outcome>) -> Value {
    let rendered: BTreeMap<&String, &str> = outcomes
        .iter()
        .map(|(container, outcome)| (container, outcome.as_str()))
        .collect();

    json!({
        "task": name,
        "family": &record.family,
        "containers": rendered,
        "instances": &record.containers,
    })
}

fn select_tasks(state: &TaskState, name: Option<&str>) -> Result<Vec<String>, CoreError> {
    match name {
        Some(name) => {
            if state.tasks.contains_key(name) {
                Ok(vec![name.to_string()])
            } else {
                Err(unknown_task(name))
            }
        }
        None => Ok(state.tasks.keys().cloned().collect()),
    }
}

fn unknown_task(name: &str) -> CoreError {
    CoreError {
        component: None,
        operation: None,
        task: Some(name.to_string()),
        kind: CoreErrorKind::NotFound,
        message: format!("no task named '{name}' is recorded"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::render_envelope;
    use crate::models::{CoreError, CoreErrorKind};

    #[test]
    fn envelope_wraps_success_payload() {
        let envelope = render_envelope(Ok(json!(["web"])));
        assert_eq!(envelope["status"], "ok");
        assert_eq!(envelope["result"], json!(["web"]));
    }

    #[test]
    fn envelope_reports_failures_in_band() {
        let envelope = render_envelope(Err(CoreError {
            component: None,
            operation: None,
            task: Some("web".to_string()),
            kind: CoreErrorKind::NotFound,
            message: "no task named 'web' is recorded".to_string(),
        }));
        assert_eq!(envelope["status"], "failed");
        assert_eq!(envelope["result"], "NotFound: no task named 'web' is recorded");
    }
}
