use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use attribute_configurator::AttributeConfigurator;
use matter_client::MatterConnector;
use matter_config_app::session::{self, exit_code, SessionOutcome};
use matter_config_app::{report, AppConfig, Prompter, RequestInput};

const EXAMPLES: &str = "\
Examples:
  # Interactive mode (prompts for missing values)
  matter-config

  # All positional arguments (node-id endpoint-id cluster-id attribute-id attribute-value [url])
  matter-config 3 1 1030 3 30
  matter-config 3 1 1030 3 30 ws://192.168.1.100:5580/ws

  # Partial arguments (will prompt for missing ones)
  matter-config 3 1 1030";

#[derive(Debug, Parser)]
#[command(
    name = "matter-config",
    about = "Configure Matter device attributes via the Matter server",
    after_help = EXAMPLES
)]
struct Args {
    /// Matter node ID
    node_id: Option<u64>,
    /// Endpoint ID
    endpoint_id: Option<u16>,
    /// Cluster ID
    cluster_id: Option<u32>,
    /// Attribute ID
    attribute_id: Option<u32>,
    /// New attribute value
    #[arg(allow_negative_numbers = true)]
    attribute_value: Option<i64>,
    /// Matter server WebSocket URL [default: ws://homeassistant.local:5580/ws]
    url: Option<String>,
    /// TOML or JSON config file (also read from MATTER_CONFIG)
    #[arg(long)]
    config: Option<String>,
}

impl Args {
    fn request_input(&self) -> RequestInput {
        RequestInput {
            node_id: self.node_id,
            endpoint_id: self.endpoint_id,
            cluster_id: self.cluster_id,
            attribute_id: self.attribute_id,
            attribute_value: self.attribute_value,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    tokio::select! {
        outcome = run(args) => exit_code(&outcome),
        _ = tokio::signal::ctrl_c() => {
            // The interrupted run, and with it any open connection, is
            // already dropped here. A prompt thread blocked on stdin would
            // keep the runtime alive, so leave without waiting for it.
            println!("\nOperation cancelled by user.");
            std::process::exit(0);
        }
    }
}

async fn run(args: Args) -> Result<SessionOutcome> {
    let config = AppConfig::resolve(args.config.clone(), args.url.clone())?;

    report::print_intro(&mut io::stdout())?;

    let input = args.request_input();
    let server_url = config.server_url.clone();
    let request = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let mut prompter = Prompter::new(stdin.lock(), io::stdout());
        session::confirm_request(&mut prompter, input, server_url)
    })
    .await
    .context("prompt task failed")??;

    let Some(request) = request else {
        return Ok(SessionOutcome::Cancelled);
    };

    let configurator = AttributeConfigurator::new(
        MatterConnector::new(config.client.clone()),
        config.configurator.clone(),
    );
    let result = session::apply(&mut io::stdout(), &configurator, &request).await?;
    Ok(SessionOutcome::Completed(result))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
