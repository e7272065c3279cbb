use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use berth_core::adapters::{
    DockerRuntime, EcsDefinitionSource, ProcessDockerSource, ProcessEcsSource,
};
use berth_core::commands::{Dispatcher, render_envelope};
use berth_core::config::Config;
use berth_core::execution::{ProcessExecutor, TokioProcessExecutor};
use berth_core::store::{ProcessS3Sync, StateStore};

#[derive(Parser)]
#[command(name = "berth", version, about = "Single-host container convergence agent")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Converge one task, or every recorded task when no selector is given
    Run {
        /// Task family to resolve container specs from
        #[arg(long)]
        task: Option<String>,
        /// Task name to run the family under
        #[arg(long)]
        name: Option<String>,
        /// Treat every container in scope as if no instance exists
        #[arg(long)]
        restart: bool,
    },
    /// List recorded tasks, or the instances confirmed running
    List {
        #[arg(long)]
        running: bool,
    },
    /// Remove a task's instances (all tasks when no name is given)
    Remove {
        name: Option<String>,
        /// Also delete the task record itself
        #[arg(long)]
        definition: bool,
    },
    /// Pull one image, or refresh every locally present image
    Pull {
        image: Option<String>,
    },
}

fn main() {
    let _ = tracing_subscriber::fmt::try_init();
    let cli = Cli::parse();

    let envelope = dispatch(cli.command);
    println!("{envelope}");
}

fn dispatch(command: Command) -> Value {
    // Configuration failures abort before any lock is taken.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => return json!({"status": "failed", "result": error.to_string()}),
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return json!({
                "status": "failed",
                "result": format!("failed to create tokio runtime: {error}"),
            });
        }
    };
    let _guard = runtime.enter();

    let executor: Arc<dyn ProcessExecutor> = Arc::new(TokioProcessExecutor);
    let docker = DockerRuntime::new(ProcessDockerSource::new(executor.clone()));
    let definitions = EcsDefinitionSource::new(ProcessEcsSource::new(executor.clone()));
    let remote = Arc::new(ProcessS3Sync::new(executor, config.bucket.clone()));
    let store = StateStore::from_config(&config, remote);
    let dispatcher = Dispatcher::new(&config, &store, &docker, &definitions);

    let result = match command {
        Command::Run {
            task,
            name,
            restart,
        } => dispatcher.run(task.as_deref(), name.as_deref(), restart),
        Command::List { running } => dispatcher.list(running),
        Command::Remove { name, definition } => dispatcher.remove(name.as_deref(), definition),
        Command::Pull { image } => dispatcher.pull(image.as_deref()),
    };

    render_envelope(result)
}
