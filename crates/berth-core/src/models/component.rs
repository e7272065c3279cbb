/// External collaborators the agent shells out to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ComponentId {
    Docker,
    EcsDefinitions,
    S3Sync,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    EnsureNetwork,
    InspectInstance,
    ListRunning,
    ListImages,
    RemoveInstance,
    PullImage,
    StartInstance,
    ResolveFamily,
    PullState,
    PushState,
}
