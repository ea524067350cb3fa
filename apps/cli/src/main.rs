use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dlnalink_core::Config;
use dlnalink_upnp::{Device, DlnaController};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_MEDIA_URL: &str = "http://vjs.zencdn.net/v/oceans.mp4";

#[derive(Parser)]
#[command(name = "dlnalink", version, about = "Discover DLNA media renderers and cast to them")]
struct Cli {
    /// Config file (defaults to <config dir>/dlnalink/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// SSDP receive window in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Description URL to add directly, skipping SSDP (repeatable)
    #[arg(long, global = true)]
    location: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List media renderers on the local network
    Discover {
        /// Print a JSON array instead of one line per device
        #[arg(long)]
        json: bool,
    },
    /// Play a media URL on a renderer
    Cast {
        #[arg(default_value = DEFAULT_MEDIA_URL)]
        media_url: String,

        /// Friendly name (substring) or UDN of the target
        #[arg(short, long)]
        device: Option<String>,

        /// Title announced in the DIDL-Lite metadata
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Stop playback
    Stop {
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Pause playback
    Pause {
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Show the transport state
    Status {
        #[arg(short, long)]
        device: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info,dlnalink=debug" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config =
        Config::load_or_default(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(timeout_ms) = cli.timeout_ms {
        config.discovery.receive_timeout_ms = timeout_ms;
    }

    let controller = DlnaController::new(&config).context("Failed to create HTTP clients")?;

    match cli.command {
        Command::Discover { json } => {
            let devices = populate(&controller, &cli.location, !json).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No devices found");
            }
        }
        Command::Cast {
            media_url,
            device,
            title,
        } => {
            populate(&controller, &cli.location, false).await?;
            let target = select_device(&controller, device.as_deref())?;
            let title = title.unwrap_or_else(|| config.cast.title.clone());

            println!("Casting {} to {}", media_url, target.friendly_name);
            controller
                .cast_with_title(&target, &media_url, &title)
                .await
                .with_context(|| format!("Cast to {} failed", target.friendly_name))?;
            println!("Playing on {}", target.friendly_name);
        }
        Command::Stop { device } => {
            populate(&controller, &cli.location, false).await?;
            let target = select_device(&controller, device.as_deref())?;
            controller.stop(&target).await?;
            println!("Stopped {}", target.friendly_name);
        }
        Command::Pause { device } => {
            populate(&controller, &cli.location, false).await?;
            let target = select_device(&controller, device.as_deref())?;
            controller.pause(&target).await?;
            println!("Paused {}", target.friendly_name);
        }
        Command::Status { device } => {
            populate(&controller, &cli.location, false).await?;
            let target = select_device(&controller, device.as_deref())?;
            let info = controller.transport_info(&target).await?;
            println!("{}: {} ({})", target.friendly_name, info.state, info.status);
        }
    }

    Ok(())
}

/// Fill the registry from `--location` URLs, or from SSDP when none are given
async fn populate(
    controller: &DlnaController,
    locations: &[String],
    print: bool,
) -> Result<Vec<Device>> {
    if !locations.is_empty() {
        for location in locations {
            let device = controller
                .add_device_from_location(location)
                .await
                .with_context(|| format!("Failed to fetch description from {}", location))?;
            if print {
                print_device(&device);
            }
        }
        return Ok(controller.devices());
    }

    let mut events = controller.subscribe();
    let discovery = controller.start_discovery();
    tokio::pin!(discovery);

    let report = loop {
        tokio::select! {
            result = &mut discovery => break result.context("SSDP discovery failed")?,
            Ok(device) = events.recv(), if print => print_device(&device),
        }
    };
    if print {
        while let Ok(device) = events.try_recv() {
            print_device(&device);
        }
    }

    tracing::info!(
        "Discovery finished in {:?}: {} response(s), {} location(s), {} device(s)",
        report.elapsed,
        report.responses,
        report.locations,
        report.devices
    );

    Ok(controller.devices())
}

fn select_device(controller: &DlnaController, query: Option<&str>) -> Result<Device> {
    let castable = controller.registry().castable();

    let found = match query {
        Some(query) => castable.into_iter().find(|d| d.matches(query)),
        None => castable.into_iter().next(),
    };

    match (found, query) {
        (Some(device), _) => Ok(device),
        (None, Some(query)) => bail!("No castable device matches '{}'", query),
        (None, None) => bail!("No castable devices found"),
    }
}

fn print_device(device: &Device) {
    let endpoint = device.control_endpoint.as_deref().unwrap_or("not castable");
    println!(
        "{} | {} | {} | {} | {}",
        device.friendly_name, device.model_name, device.manufacturer, device.unique_id, endpoint
    );
}
