//! Subcommand implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use rootclay_communication::{
    list_ports, PrinterController, SerialOpener, SourceOrigin,
};
use rootclay_core::{EventBus, EventFilter, StreamEvent};
use rootclay_settings::{default_config_path, Config};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{Cli, Command, LinkArgs};

/// Run the parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Ports => ports(),
        Command::Send {
            link,
            wait_ms,
            commands,
        } => send(&config, &link, cli.json, Duration::from_millis(wait_ms), commands).await,
        Command::Stream { link, file } => stream(&config, &link, cli.json, file).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Config::load_default().with_context(|| match default_config_path() {
            Some(path) => format!("loading settings from {}", path.display()),
            None => "loading default settings".to_string(),
        })?,
    };
    Ok(config)
}

fn ports() -> anyhow::Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No printer ports found");
    }
    for port in ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}\t{}\t{:04x}:{:04x}",
                port.port_name, port.description, vid, pid
            ),
            _ => println!("{}\t{}", port.port_name, port.description),
        }
    }
    Ok(())
}

/// Event bus printing every event to stdout
fn console_bus(json: bool) -> Arc<EventBus> {
    let bus = Arc::new(EventBus::new());
    bus.subscribe(EventFilter::All, move |event| {
        if json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to encode event: {}", e),
            }
            return;
        }
        match event {
            StreamEvent::StateChanged { .. } => {}
            StreamEvent::Fault { .. } | StreamEvent::Error { .. } => {
                eprintln!("{}", event.description())
            }
            _ => println!("{}", event.description()),
        }
    });
    bus
}

async fn connect(
    config: &Config,
    link: &LinkArgs,
    bus: Arc<EventBus>,
) -> anyhow::Result<PrinterController> {
    let port = link
        .port
        .clone()
        .or_else(|| config.connection.port.clone())
        .ok_or_else(|| anyhow!("no port given; pass --port or set connection.port"))?;
    let baud = link.baud.unwrap_or(config.connection.baud_rate);

    let controller =
        PrinterController::spawn(Arc::new(SerialOpener), bus, config.controller_config());
    controller
        .connect(&port, baud)
        .await
        .with_context(|| format!("connecting to {}", port))?;
    Ok(controller)
}

async fn send(
    config: &Config,
    link: &LinkArgs,
    json: bool,
    wait: Duration,
    commands: Vec<String>,
) -> anyhow::Result<()> {
    let bus = console_bus(json);
    let controller = connect(config, link, bus).await?;

    for command in commands {
        controller
            .send_immediate(command.as_str())
            .await
            .with_context(|| format!("sending '{}'", command))?;
    }

    tokio::time::sleep(wait).await;
    controller.shutdown().await?;
    Ok(())
}

async fn stream(
    config: &Config,
    link: &LinkArgs,
    json: bool,
    file: PathBuf,
) -> anyhow::Result<()> {
    let bus = console_bus(json);
    let mut events = bus.receiver();
    let controller = connect(config, link, bus).await?;

    controller
        .start_stream(SourceOrigin::File(file.clone()))
        .await
        .with_context(|| format!("starting stream of {}", file.display()))?;

    let mut interrupted = false;
    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) if event.is_terminal() => break event,
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Console fell behind by {} events", missed);
                }
                Err(RecvError::Closed) => bail!("event bus closed"),
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.context("listening for Ctrl-C")?;
                interrupted = true;
                tracing::info!("Interrupted, stopping stream");
                controller.stop_stream().await?;
            }
        }
    };

    controller.shutdown().await?;
    match outcome {
        StreamEvent::Error { kind, detail } => bail!("stream failed: {}: {}", kind, detail),
        _ => Ok(()),
    }
}
