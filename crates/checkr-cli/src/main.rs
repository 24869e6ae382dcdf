use anyhow::{bail, Context as _, Result};
use clap::Parser as _;
use serde_json::{json, Value as JsonValue};
use std::io::Read as _;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

use checkr_core::Options;
use checkr_runtime::{DispatchError, Dispatcher, Settings};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = Settings::from_env().context("Failed to load settings")?;
    if let Some(provider) = cli.provider {
        settings.provider_name = provider.to_lowercase();
    }
    if let Some(config) = cli.config {
        settings.provider_config_path = config;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let dispatcher = Dispatcher::from_settings(&settings)?;

    match run(&dispatcher, cli.command).await {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let rejected = e
                .downcast_ref::<DispatchError>()
                .is_some_and(|fault| fault.is_client_fault() || fault.is_not_found());
            if !rejected {
                return Err(e);
            }
            eprintln!("error: {}", e);
            Ok(ExitCode::from(2))
        }
    }
}

async fn run(dispatcher: &Dispatcher, command: Commands) -> Result<JsonValue> {
    let output = match command {
        Commands::List => serde_json::to_value(dispatcher.list_catalog().await?)?,
        Commands::Show { source } => serde_json::to_value(dispatcher.get_descriptor(&source).await?)?,
        Commands::Source { source } => {
            let content = dispatcher.fetch_source(&source).await?;
            json!({ "source": source, "content": content })
        }
        Commands::BaseSources => serde_json::to_value(dispatcher.fetch_base_sources().await?)?,
        Commands::Validate {
            dataset,
            gates,
            options,
        } => {
            let dataset = read_dataset(&dataset)?;
            let options = parse_options(options.as_deref())?;
            tracing::info!(gates = gates.len(), "Validating dataset");
            serde_json::to_value(dispatcher.validate(&gates, &dataset, &options).await?)?
        }
    };
    Ok(output)
}

fn read_dataset(path: &Path) -> Result<JsonValue> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read dataset from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Dataset is not valid JSON")
}

fn parse_options(raw: Option<&str>) -> Result<Options> {
    let Some(raw) = raw else {
        return Ok(Options::new());
    };
    match serde_json::from_str(raw).context("Options are not valid JSON")? {
        JsonValue::Object(options) => Ok(options),
        other => bail!("Options must be a JSON object, got {}", other),
    }
}
