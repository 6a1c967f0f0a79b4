use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use sensitivity_gateway::api::config::ApiConfig;
use sensitivity_gateway::api::models::RequestContext;
use sensitivity_gateway::api::processor::process_request;
use sensitivity_gateway::api::start_server;
use sensitivity_gateway::config::Settings;
use sensitivity_gateway::utils::logger::init_logger;
use sensitivity_gateway::Services;

#[derive(Parser)]
#[command(name = "sensitivity_gateway", version, about = "Sensitivity classification and anonymization gateway")]
struct Cli {
    /// Settings file (defaults to ./gateway.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one request through the pipeline and print the report as JSON
    Run {
        #[arg(long)]
        email: String,
        #[arg(long)]
        domain: String,
        #[arg(long)]
        purpose: String,
        #[arg(long)]
        source: String,
        #[arg(long, value_delimiter = ',', required = true)]
        attributes: Vec<String>,
    },
    /// Load and validate every artifact, then exit
    Check,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    init_logger(&settings.logging.dir, settings.logging.log_to_stdout)
        .context("initializing logger")?;

    let services = Arc::new(Services::from_settings(&settings).context("loading pipeline services")?);

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            let config = ApiConfig::from_settings(&settings.server);
            start_server(&settings.server.host, settings.server.port, config, services).await?;
        }
        Command::Run {
            email,
            domain,
            purpose,
            source,
            attributes,
        } => {
            let request = RequestContext {
                requester_email: email,
                requested_domain: domain,
                purpose,
                source_identifier: source,
                selected_attributes: attributes,
            };
            request.validate().map_err(anyhow::Error::msg)?;
            let report = process_request(request, &services).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            services.close();
        }
        Command::Check => {
            info!("All artifacts loaded and validated");
            println!("ok");
            services.close();
        }
    }

    Ok(())
}
