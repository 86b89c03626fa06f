use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use kiln_advisor::Advisor;
use kiln_advisor::config::AdvisorConfig;
use kiln_advisor::flows::{FormData, sample_form};
use kiln_advisor::primitives::FieldSpec;
use kiln_advisor::telemetry::init_tracing;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "advisor-cli", about = "Cement plant advisory flows", version)]
pub struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List flows with their input and output fields
    List,
    /// Run one flow from form fields and print the result as JSON
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Flow id, as shown by `list`
    #[arg(value_name = "FLOW_ID")]
    flow: String,
    /// Form field as key=value; repeatable
    #[arg(short = 'f', long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    fields: Vec<(String, String)>,
    /// Start from the built-in demo readings for the flow
    #[arg(long)]
    sample: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let config = match &self.config {
            Some(path) => AdvisorConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AdvisorConfig::default(),
        };
        init_tracing(&config.logging)?;

        match self.command {
            Command::List => {
                list(&config)?;
                Ok(ExitCode::SUCCESS)
            }
            Command::Run(args) => run(&config, args).await,
        }
    }
}

fn list(config: &AdvisorConfig) -> anyhow::Result<()> {
    let registry = kiln_advisor::flows::shared_catalog()?;
    for flow in registry.iter() {
        let inputs: Vec<&str> = flow.input().fields().iter().map(FieldSpec::name).collect();
        let outputs: Vec<&str> = flow.output().fields().iter().map(FieldSpec::name).collect();
        println!("{}  ({})", flow.id(), flow.title());
        println!("    inputs:  {}", inputs.join(", "));
        println!("    outputs: {}", outputs.join(", "));
    }
    println!();
    println!("plant: {}", config.plant.name);
    Ok(())
}

async fn run(config: &AdvisorConfig, args: RunArgs) -> anyhow::Result<ExitCode> {
    let advisor = Advisor::from_config(config)?;

    let mut form = FormData::new();
    if args.sample {
        match sample_form(&args.flow) {
            Some(sample) => form.extend(sample),
            None => bail!("no sample readings for flow `{}`", args.flow),
        }
    }
    form.extend(args.fields);
    debug!(flow = %args.flow, fields = form.len(), "submitting form");

    let state = advisor.handle(&args.flow, &form).await?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    Ok(if state.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok((key.to_owned(), value.to_owned()))
}
