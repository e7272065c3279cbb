use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::process_utils::run_and_collect_stdout;
use crate::execution::{CommandSpec, ProcessExecutor, ProcessSpawnRequest};
use crate::models::{ComponentId, CoreError, CoreErrorKind, Operation};
use crate::store::StoreResult;

const AWS_COMMAND: &str = "aws";
const SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// Copies the state document between the remote object store and the local
/// working file. An absent remote object is a valid state (the empty store),
/// not an error.
pub trait RemoteSync: Send + Sync {
    /// Returns false when the remote object does not exist.
    fn pull_to_local(&self, key: &str, local: &Path) -> StoreResult<bool>;

    fn push_from_local(&self, key: &str, local: &Path) -> StoreResult<()>;
}

pub struct ProcessS3Sync {
    executor: Arc<dyn ProcessExecutor>,
    bucket: String,
}

impl ProcessS3Sync {
    pub fn new(executor: Arc<dyn ProcessExecutor>, bucket: impl Into<String>) -> Self {
        Self {
            executor,
            bucket: bucket.into(),
        }
    }
}

impl RemoteSync for ProcessS3Sync {
    fn pull_to_local(&self, key: &str, local: &Path) -> StoreResult<bool> {
        let request = s3_pull_request(&self.bucket, key, local)?;
        match run_and_collect_stdout(self.executor.as_ref(), request) {
            Ok(_) => Ok(true),
            Err(error) if is_absent_object_error(&error) => Ok(false),
            Err(error) => Err(error),
        }
    }

    fn push_from_local(&self, key: &str, local: &Path) -> StoreResult<()> {
        let request = s3_push_request(&self.bucket, key, local)?;
        let _ = run_and_collect_stdout(self.executor.as_ref(), request)?;
        Ok(())
    }
}

pub fn s3_pull_request(bucket: &str, key: &str, local: &Path) -> StoreResult<ProcessSpawnRequest> {
    let local = utf8_path(local, Operation::PullState)?;
    let url = object_url(bucket, key);
    Ok(ProcessSpawnRequest::new(
        ComponentId::S3Sync,
        Operation::PullState,
        CommandSpec::new(AWS_COMMAND).args(["s3", "cp", url.as_str(), local]),
    )
    .timeout(SYNC_TIMEOUT))
}

pub fn s3_push_request(bucket: &str, key: &str, local: &Path) -> StoreResult<ProcessSpawnRequest> {
    let local = utf8_path(local, Operation::PushState)?;
    let url = object_url(bucket, key);
    Ok(ProcessSpawnRequest::new(
        ComponentId::S3Sync,
        Operation::PushState,
        CommandSpec::new(AWS_COMMAND).args(["s3", "cp", local, url.as_str()]),
    )
    .timeout(SYNC_TIMEOUT))
}

fn object_url(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

fn utf8_path<'a>(local: &'a Path, operation: Operation) -> StoreResult<&'a str> {
    local.to_str().ok_or_else(|| CoreError {
        component: Some(ComponentId::S3Sync),
        operation: Some(operation),
        task: None,
        kind: CoreErrorKind::InvalidInput,
        message: format!("local state path '{}' is not valid UTF-8", local.display()),
    })
}

fn is_absent_object_error(error: &CoreError) -> bool {
    error.kind == CoreErrorKind::ProcessFailure
        && (error.message.contains("(404)")
            || error.message.contains("NoSuchKey")
            || error.message.contains("does not exist"))
}
