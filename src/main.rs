mod cli;

use anyhow::{bail, Context, Result};
use netstack_vpn::config::Settings;
use netstack_vpn::control;
use netstack_vpn::engine::UapiEngine;
use netstack_vpn::network::KernelInterface;
use netstack_vpn::{translate, SessionManager};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use cli::Commands;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse_args();

    let mut settings = Settings::load(cli.settings.as_deref()).context("loading settings")?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    // Initialize the logger
    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.tracing_level()?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Translate {
            config,
            show_secrets,
            json,
        } => print_directives(&config, show_secrets, json),
        Commands::Up { config, exit_node } => run_session(&settings, &config, exit_node).await,
    }
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_directives(path: &Path, show_secrets: bool, json: bool) -> Result<()> {
    let mut directives = translate(&read_config(path)?);
    if !show_secrets {
        directives = directives.redacted();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&directives)?);
    } else {
        println!("{}", directives);
    }
    Ok(())
}

async fn run_session(settings: &Settings, path: &Path, exit_node: bool) -> Result<()> {
    let config = read_config(path)?;
    let manager = Arc::new(SessionManager::new(
        KernelInterface::new(settings.interface_name.clone()),
        UapiEngine::new(settings.uapi_socket_dir.clone()),
    ));

    let starter = Arc::clone(&manager);
    let code = tokio::task::spawn_blocking(move || {
        control::start_session(&*starter, &config, exit_node)
    })
    .await?;
    if code != control::SUCCESS {
        bail!("tunnel failed to start (code {})", code);
    }

    let mut ticker = tokio::time::interval(settings.status_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Not awaited so a slow engine reply cannot hold up Ctrl-C
                let reporter = Arc::clone(&manager);
                tokio::task::spawn_blocking(move || {
                    info!("Status:\n{}", control::get_session_status(&*reporter));
                });
            }
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for Ctrl-C")?;
                break;
            }
        }
    }

    let stopper = Arc::clone(&manager);
    tokio::task::spawn_blocking(move || control::stop_session(&*stopper)).await?;
    info!("VPN service stopped");
    Ok(())
}
