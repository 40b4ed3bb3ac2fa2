// ABOUTME: Entry point for the imagewright CLI application.
// ABOUTME: Reads JSON records, dispatches lifecycle verbs, and prints JSON results on stdout.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use imagewright::auth::{CredentialResolver, CredentialSources};
use imagewright::config::Config;
use imagewright::diagnostics::Warning;
use imagewright::error::{Error, Result};
use imagewright::lifecycle::{ImageLifecycle, ReadOutcome};
use imagewright::registry::RegistryClient;
use imagewright::resource::{ImageResource, image_resource_schema};
use imagewright::runtime::{BollardToolchain, RuntimeError, detect_runtime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Debug with --verbose, otherwise RUST_LOG or warnings only
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Cancelled),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Stdout envelope for every lifecycle verb.
#[derive(Serialize)]
struct Output<'a> {
    state: Option<&'a ImageResource>,
    warnings: &'a [Warning],
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateInput {
    plan: ImageResource,
    prior: ImageResource,
}

async fn run(cli: Cli) -> Result<()> {
    // Schema output needs no settings file.
    let config = || load_config(cli.config.as_deref());

    match cli.command {
        Commands::Schema => print_json(&image_resource_schema()),
        Commands::Create { input } => {
            let desired: ImageResource = read_input(input.as_deref()).await?;
            let applied = full_lifecycle(&config()?)?.create(desired).await?;
            print_state(Some(&applied.resource), applied.diagnostics.warnings())
        }
        Commands::Read { input } => {
            let state: ImageResource = read_input(input.as_deref()).await?;
            match inspect_lifecycle(&config()?).read(state).await? {
                ReadOutcome::Present(state) => print_state(Some(&state), &[]),
                ReadOutcome::Gone => print_state(None, &[]),
            }
        }
        Commands::Update { input } => {
            let UpdateInput { plan, prior } = read_input(input.as_deref()).await?;
            let applied = full_lifecycle(&config()?)?.update(plan, &prior).await?;
            print_state(Some(&applied.resource), applied.diagnostics.warnings())
        }
        Commands::Delete { input } => {
            let state: ImageResource = read_input(input.as_deref()).await?;
            let outcome = inspect_lifecycle(&config()?).delete(&state).await;
            print_state(None, outcome.diagnostics.warnings())
        }
        Commands::Import { image_uri } => {
            let state = inspect_lifecycle(&config()?).import(&image_uri)?;
            print_state(Some(&state), &[])
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover_or_default(&std::env::current_dir()?),
    }
}

fn credential_resolver(config: &Config) -> CredentialResolver {
    CredentialResolver::new(CredentialSources::from_cli(
        config.aws_cli.clone(),
        config.gcloud_cli.clone(),
    ))
}

fn registry_client(config: &Config) -> RegistryClient {
    RegistryClient::new().with_insecure_registries(config.insecure_registries.clone())
}

fn inspect_lifecycle(config: &Config) -> ImageLifecycle<(), RegistryClient> {
    ImageLifecycle::inspect_only(registry_client(config), credential_resolver(config))
}

fn full_lifecycle(config: &Config) -> Result<ImageLifecycle<BollardToolchain, RegistryClient>> {
    let info = detect_runtime(&config.runtime_config()).map_err(RuntimeError::from)?;
    let toolchain = BollardToolchain::connect(&info, config.docker_timeout)?;
    Ok(ImageLifecycle::new(
        toolchain,
        registry_client(config),
        credential_resolver(config),
    ))
}

async fn read_input<T: serde::de::DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            raw
        }
    };
    serde_json::from_str(&raw).map_err(Error::InvalidInput)
}

fn print_state(state: Option<&ImageResource>, warnings: &[Warning]) -> Result<()> {
    print_json(&Output { state, warnings })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
