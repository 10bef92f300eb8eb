use std::path::PathBuf;
use std::sync::Arc;

use cirrus_core::{Instance, ResourceSpec};
use cirrus_provisioner::{Drivers, StatePersistence, StateStore};
use cirrus_storage::StateObject;
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

mod aws;
mod config;

#[derive(Debug, Parser)]
#[command(name = "cirrus", version, about = "Reconcile ECS services, task definitions, and functions")]
struct Cli {
    /// Stack file describing the resources to reconcile.
    #[arg(long, short, env = "CIRRUS_CONFIG", default_value = "cirrus.json")]
    config: PathBuf,

    /// Emit structured JSON logs instead of human-readable output.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Restrict the command to a single resource id.
    #[arg(long, global = true)]
    only: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Create, update, or replace every resource, in stack order.
    Deploy,
    /// Tear down every resource, in reverse stack order.
    Remove,
    /// Refresh recorded state from the remote system.
    Get,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let stack = config::load_config(&cli.config)?;
    let mut specs = stack.specs()?;
    if let Some(only) = &cli.only {
        specs.retain(|(id, _)| id == only);
        if specs.is_empty() {
            return Err(eyre::eyre!("no resource with id '{only}' in {}", cli.config.display()));
        }
    }

    let region = stack.region_or(std::env::var("AWS_DEFAULT_REGION").ok());
    let sdk_config = aws::build_aws_config(&region, &stack.credentials).await;

    let mut persistence = StatePersistence::local(&stack.state.local_path);
    if let Some(bucket) = &stack.state.bucket {
        persistence = persistence.with_remote(StateObject::new(
            aws_sdk_s3::Client::new(&sdk_config),
            bucket.clone(),
            stack.state.key.clone(),
        ));
    }
    let store: Arc<dyn StateStore> = Arc::new(persistence);
    let drivers = Drivers::from_sdk_config(&sdk_config);

    tracing::info!(
        region = %region,
        resources = specs.len(),
        command = ?cli.command,
        "starting"
    );

    if matches!(cli.command, Command::Remove) {
        specs.reverse();
    }

    let mut output = serde_json::Map::new();
    for (id, spec) in &specs {
        let instance = run(&drivers, cli.command, id, spec, Arc::clone(&store))
            .await
            .wrap_err_with(|| format!("{:?} failed for resource '{id}'", cli.command))?;
        output.insert(id.clone(), serde_json::to_value(&instance)?);
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Reconcile one resource instance, one instance at a time.
async fn run(
    drivers: &Drivers,
    command: Command,
    id: &str,
    spec: &ResourceSpec,
    store: Arc<dyn StateStore>,
) -> eyre::Result<Instance> {
    let ctx = Drivers::context(spec, id, store);
    let instance = match command {
        Command::Deploy => drivers.deploy(spec, None, &ctx).await?,
        Command::Remove => drivers.remove(spec, None, &ctx).await?,
        Command::Get => drivers.get(spec, None, &ctx).await?,
    };

    if let ResourceSpec::Function(_) = spec
        && let Some(sink) = drivers.function.sink_config(&instance)
    {
        tracing::info!(resource = %id, uri = %sink.uri, protocol = sink.protocol, "function sink");
    }
    Ok(instance)
}
