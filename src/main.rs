//! Dunder binary
//!
//! Serves the HTTP API by default; `chat` and `ask` talk to the office from the terminal.

use clap::Parser;
use dunder::agents::AgentRequest;
use dunder::cli::{Cli, Command, generate_config_template};
use dunder::config::Config;
use dunder::handlers::{self, AppState};
use dunder::repl::Repl;
use dunder::router::Orchestrator;
use dunder::telemetry;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => write_config_template(output.as_deref())?,
        Some(Command::Chat) => chat(&cli.config).await?,
        Some(Command::Ask { text, agent }) => ask(&cli.config, &text.join(" "), agent).await?,
        Some(Command::Serve) | None => serve(&cli.config).await?,
    }

    Ok(())
}

fn write_config_template(output: Option<&str>) -> std::io::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, generate_config_template())?;
            eprintln!("Configuration template written to {}", path);
        }
        None => print!("{}", generate_config_template()),
    }
    Ok(())
}

async fn serve(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(Config::from_file(config_path)?);
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting Dunder server on {}:{}",
        config.server.host,
        config.server.port
    );

    let state = AppState::new(config.clone())?;
    let app = handlers::app(state);

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([127, 0, 0, 1])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Chat available at http://{}/chat", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}

async fn chat(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    telemetry::init_interactive("warn");

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Repl::new(orchestrator).run(stdin, tokio::io::stdout()).await?;
    Ok(())
}

async fn ask(
    config_path: &str,
    text: &str,
    agent: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_file(config_path)?;
    telemetry::init_interactive("warn");

    let orchestrator = Orchestrator::from_config(&config)?;
    let request = AgentRequest::new(text);
    let response = match agent {
        Some(agent) => orchestrator.dispatch_to(&agent, &request).await,
        None => {
            let cancel = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            orchestrator.route_cancellable(&request, cancel).await?
        }
    };

    match &response.agent {
        Some(agent) => println!("[{}] {}", agent, response.content),
        None => println!("{}", response.content),
    }
    Ok(())
}
