use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::adapters::runtime::{ContainerRuntime, StartRequest};
use crate::models::{ContainerSpec, CoreError, CoreErrorKind, TaskRecord};

pub type ConvergenceResult<T> = Result<T, CoreError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Restarted,
    Unchanged,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restarted => "restarted",
            Self::Unchanged => "unchanged",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    InProgress,
    Done(Outcome),
}

/// Reconciles one task's declared container specs against its recorded and
/// actually-running instances.
///
/// Traversal is depth-first over the family's specs in declaration order,
/// dependencies first, with the outcome memoized per spec. A spec re-entered
/// while still on the recursion stack is a dependency cycle and fails the
/// task's convergence instead of hanging.
pub struct Converger<'a> {
    runtime: &'a dyn ContainerRuntime,
    network: &'a str,
    force_restart: bool,
}

impl<'a> Converger<'a> {
    pub fn new(runtime: &'a dyn ContainerRuntime, network: &'a str, force_restart: bool) -> Self {
        Self {
            runtime,
            network,
            force_restart,
        }
    }

    pub fn converge_task(
        &self,
        task: &str,
        family: &str,
        specs: &[ContainerSpec],
        record: &mut TaskRecord,
    ) -> ConvergenceResult<BTreeMap<String, Outcome>> {
        let index: HashMap<&str, &ContainerSpec> =
            specs.iter().map(|spec| (spec.name.as_str(), spec)).collect();

        for spec in specs {
            for link in &spec.links {
                if !index.contains_key(link.as_str()) {
                    return Err(CoreError {
                        component: None,
                        operation: None,
                        task: Some(task.to_string()),
                        kind: CoreErrorKind::InvalidInput,
                        message: format!(
                            "container '{}' links to unknown container '{link}'",
                            spec.name
                        ),
                    });
                }
            }
        }

        record.family = family.to_string();

        let mut states: HashMap<String, VisitState> = HashMap::new();
        for spec in specs {
            self.visit(task, spec, &index, &mut states, record)?;
        }

        let mut outcomes = BTreeMap::new();
        for (name, state) in states {
            if let VisitState::Done(outcome) = state {
                outcomes.insert(name, outcome);
            }
        }
        Ok(outcomes)
    }

    fn visit(
        &self,
        task: &str,
        spec: &ContainerSpec,
        index: &HashMap<&str, &ContainerSpec>,
        states: &mut HashMap<String, VisitState>,
        record: &mut TaskRecord,
    ) -> ConvergenceResult<Outcome> {
        match states.get(spec.name.as_str()) {
            Some(VisitState::Done(outcome)) => return Ok(*outcome),
            Some(VisitState::InProgress) => {
                return Err(CoreError {
                    component: None,
                    operation: None,
                    task: Some(task.to_string()),
                    kind: CoreErrorKind::CyclicDependency,
                    message: format!(
                        "container '{}' participates in a dependency cycle",
                        spec.name
                    ),
                });
            }
            None => {}
        }
        states.insert(spec.name.clone(), VisitState::InProgress);

        // Dependencies settle first; any restarted dependency forces this one.
        let mut forced_by_dependency = false;
        for link in &spec.links {
            let dependency = index[link.as_str()];
            if self.visit(task, dependency, index, states, record)? == Outcome::Restarted {
                forced_by_dependency = true;
            }
        }

        let recorded = record.containers.get(&spec.name).cloned();
        let will_run = forced_by_dependency
            || self.force_restart
            || match &recorded {
                None => true,
                Some(instance) => !self.runtime.is_running(instance)?,
            };

        let outcome = if will_run {
            tracing::debug!(task, container = %spec.name, "starting container");
            if let Some(instance) = &recorded {
                self.runtime.remove_forcefully(instance)?;
            }
            self.runtime.pull_image(&spec.image)?;

            let environment = render_environment(&spec.environment, &record.containers);
            let started = self.runtime.start(&StartRequest::for_spec(
                spec,
                instance_name(task, &spec.name),
                self.network,
                environment,
            ))?;
            record.containers.insert(spec.name.clone(), started);
            Outcome::Restarted
        } else {
            Outcome::Unchanged
        };

        states.insert(spec.name.clone(), VisitState::Done(outcome));
        Ok(outcome)
    }
}

/// Second phase of the placeholder bind: every `{spec-name}` token in an
/// environment value is replaced with that sibling's current instance name.
fn render_environment(
    template: &BTreeMap<String, String>,
    instances: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    template
        .iter()
        .map(|(key, value)| {
            let mut rendered = value.clone();
            for (name, instance) in instances {
                let token = format!("{{{name}}}");
                if rendered.contains(&token) {
                    rendered = rendered.replace(&token, instance);
                }
            }
            (key.clone(), rendered)
        })
        .collect()
}

fn instance_name(task: &str, container: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{task}-{container}-{millis}")
}
