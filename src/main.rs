use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flymap_core::{MapConfig, MarkerGroup};
use flymap_geo::{canonicalize_group, RegionDirectory};
use flymap_render::MarkerRenderer;
use flymap_sync::{session, HostConfig, WebSocketConnector};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Flymap - live infrastructure maps rendered as SVG
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a static map from a marker groups file
    Render {
        /// Marker groups file (YAML or JSON list of groups)
        groups: PathBuf,

        /// Output path; "-" writes to stdout
        #[arg(short, long, default_value = "-")]
        output: String,
    },
    /// Follow a live map channel, writing the document on every update
    Watch {
        /// WebSocket endpoint (ws:// or wss://)
        #[arg(short, long, env = "FLYMAP_ENDPOINT")]
        endpoint: String,

        /// Channel topic, e.g. "map:fleet"
        #[arg(short, long)]
        topic: String,

        /// Output path for the rendered document
        #[arg(short, long, default_value = "flymap.svg")]
        output: PathBuf,
    },
    /// Check a marker groups file without rendering
    Validate {
        /// Marker groups file
        groups: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flymap=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let config = MapConfig::from_config_builder(path)
                .with_context(|| format!("Failed to load config file: {path:?}"))?;
            config.validate().context("Invalid configuration")?;
            info!("Configuration loaded from {:?}", path);
            config
        }
        None => MapConfig::default(),
    };

    match args.command {
        Command::Render { groups, output } => render(&config, &groups, &output),
        Command::Watch {
            endpoint,
            topic,
            output,
        } => watch(config, endpoint, topic, output).await,
        Command::Validate { groups } => validate(&config, &groups),
    }
}

fn load_groups(path: &Path) -> Result<Vec<MarkerGroup>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read groups file: {path:?}"))?;
    // serde_yaml accepts JSON input too.
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse groups file: {path:?}"))
}

/// Rejects the first invalid marker. Authoring-time input is fatal, unlike
/// wire events which are dropped and logged.
fn check_groups(groups: &[MarkerGroup], directory: &RegionDirectory) -> Result<()> {
    for group in groups {
        if group.id.is_empty() {
            bail!("group with empty id");
        }
        group
            .style
            .validate()
            .with_context(|| format!("group '{}': invalid style", group.id))?;
        for (index, result) in canonicalize_group(group, directory) {
            result.with_context(|| format!("group '{}', marker {index}", group.id))?;
        }
    }
    Ok(())
}

fn render(config: &MapConfig, groups_path: &Path, output: &str) -> Result<()> {
    let directory = RegionDirectory::with_custom(&config.custom_regions)?;
    let groups = load_groups(groups_path)?;
    check_groups(&groups, &directory)?;

    let mut renderer = MarkerRenderer::new(config.viewport, config.theme.clone());
    renderer.create_markers_from_groups(&groups, &config.viewport, &directory);
    let svg = renderer.to_svg();

    if output == "-" {
        println!("{svg}");
    } else {
        fs::write(output, svg).with_context(|| format!("Failed to write {output}"))?;
        info!(%output, "Document written");
    }
    Ok(())
}

fn validate(config: &MapConfig, groups_path: &Path) -> Result<()> {
    let directory = RegionDirectory::with_custom(&config.custom_regions)?;
    let groups = load_groups(groups_path)?;
    check_groups(&groups, &directory)?;

    for group in &groups {
        info!(
            group = %group.id,
            markers = group.markers.len(),
            visible = group.visible,
            "Group ok"
        );
    }
    info!(groups = groups.len(), "All marker groups valid");
    Ok(())
}

async fn watch(config: MapConfig, endpoint: String, topic: String, output: PathBuf) -> Result<()> {
    let host = HostConfig {
        channel_topic: topic,
        map_element_id: "flymap".to_string(),
        initial_state: None,
        progressive_enhancement: true,
    };
    let connector = WebSocketConnector::new(endpoint);
    let mut handle = session::spawn(host, config, Some(Box::new(connector)))?;
    let mut svg_rx = handle.svg_receiver();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; leaving channel");
                handle.teardown().await;
                return Ok(());
            }
            changed = svg_rx.changed() => {
                // The sender closing means the session actor exited.
                if changed.is_err() {
                    break;
                }
                let svg = svg_rx.borrow_and_update().clone();
                fs::write(&output, svg)
                    .with_context(|| format!("Failed to write {output:?}"))?;
            }
        }
    }

    if let Some(notice) = handle.try_recv_fallback() {
        warn!(reason = %notice.reason, "Session degraded; document left in last good state");
    }
    handle.wait().await;
    Ok(())
}
