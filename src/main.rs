use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber;

use versecut::{
    config::Config,
    media::{BlankTextRenderer, FfmpegProbe, FfmpegWriter},
    project::open_project,
    render::CancelToken,
};

#[derive(Parser)]
#[command(
    name = "versecut",
    version,
    about = "Render a versecut project to a video file",
    long_about = "Versecut opens a saved project document, composes every timeline frame, and exports the result as a finished video with the project's audio track muxed in."
)]
struct Cli {
    /// Project document (JSON)
    #[arg(short, long)]
    project: PathBuf,

    /// Output video file path
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting versecut v{}", env!("CARGO_PKG_VERSION"));
    info!("Project: {:?}", cli.project);
    info!("Output: {:?}", cli.output);

    // Load configuration
    let config = match cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(&config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    config.validate()?;

    // Open the project document
    let opened = open_project(&cli.project);
    if !opened.success {
        anyhow::bail!("{}", opened.message);
    }
    let project = opened.data.expect("successful open carries a project");
    info!(
        "Opened project {} ({} tracks, {} clips, {:.1} fps)",
        project.id,
        project.tracks().len(),
        project.clips().len(),
        project.fps
    );

    // Wire up the media collaborators
    let probe = Arc::new(FfmpegProbe::new()?);
    let writer = Arc::new(FfmpegWriter::new(config.export.clone()));
    let renderer = Arc::new(BlankTextRenderer::new(
        config.render.canvas.0,
        config.render.canvas.1,
    ));

    info!("Starting export...");
    let report = project
        .export_to(
            cli.output.clone(),
            config,
            renderer,
            writer,
            probe,
            Arc::new(|progress| {
                if progress.processed % 50 == 0 || progress.processed == progress.total {
                    info!(
                        "  {}/{} frames ({:.0}%)",
                        progress.processed,
                        progress.total,
                        progress.percent()
                    );
                }
            }),
            CancelToken::new(),
        )
        .await?;

    info!(
        "Export complete: {:?} ({} frames, {:.1}s, {:.1} MB)",
        report.path,
        report.frame_count,
        report.duration,
        report.file_size as f64 / 1024.0 / 1024.0
    );
    Ok(())
}
