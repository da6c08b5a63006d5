//! Headless sociogram layout
//!
//! Reads a network JSON file, runs the force layout to completion and prints
//! the network with updated layout attributes to stdout.
//!
//! Usage: sociogram-layout <network.json> [settings.json]

use sociogram_layout::graph::NetworkData;
use sociogram_layout::{LayoutError, LayoutSettings, SociogramCanvas};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let Some(network_path) = args.next() else {
        eprintln!("usage: sociogram-layout <network.json> [settings.json]");
        return ExitCode::from(2);
    };
    let settings = match args.next() {
        Some(path) => match LayoutSettings::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => LayoutSettings::load(),
    };

    match run(&network_path, settings) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(network_path: &Path, settings: LayoutSettings) -> Result<String, LayoutError> {
    let mut network = read_network(network_path)?;
    let poll = settings.worker_config().tick_interval.max(Duration::from_millis(1));

    let mut canvas = SociogramCanvas::mount(settings);
    canvas.load_network(&network);
    canvas.start_layout()?;

    let mut ticks = 0;
    loop {
        let summary = canvas.pump();
        ticks += summary.events;
        if summary.ended {
            break;
        }
        if !canvas.is_running() {
            ticks += canvas.pump().events;
            break;
        }
        std::thread::sleep(poll);
    }

    let written = match canvas.checkpoint(&mut network) {
        Ok(written) => written,
        Err(never) => match never {},
    };
    tracing::info!("Layout finished after {} events, {} positions written", ticks, written);

    serde_json::to_string_pretty(&network).map_err(|source| LayoutError::Json {
        path: network_path.to_path_buf(),
        source,
    })
}

fn read_network(path: &Path) -> Result<NetworkData, LayoutError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LayoutError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| LayoutError::Json {
        path: path.to_path_buf(),
        source,
    })
}
