use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use ytsub::{DownloaderConfig, Subtitle, SubtitleDownloader, DEFAULT_ENDPOINT};

#[derive(Parser, Debug)]
#[command(name = "ytsub")]
#[command(about = "Download the default subtitle track of a YouTube video", long_about = None)]
struct Cli {
    /// YouTube video URL (youtu.be, /watch?v=, /v/ or /embed/)
    url: String,

    /// Print the subtitle as JSON
    #[arg(long)]
    json: bool,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Base URL of the timedtext endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = DownloaderConfig::default().with_endpoint(cli.endpoint.as_str());
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let downloader = SubtitleDownloader::with_config(&cli.url, config)
        .with_context(|| format!("Failed to load caption languages for {}", cli.url))?;
    log::info!(
        "Video {} has {} caption languages",
        downloader.video_id(),
        downloader.languages().len()
    );

    let subtitle = downloader
        .download()
        .with_context(|| format!("Failed to download subtitle for {}", cli.url))?;

    let rendered = render(&subtitle, cli.json)?;
    emit(&rendered, cli.output.as_deref())
}

fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => print!("{}", rendered),
    }
    Ok(())
}

fn render(subtitle: &Subtitle, json: bool) -> Result<String> {
    if json {
        let mut out = serde_json::to_string_pretty(subtitle).context("Failed to encode JSON")?;
        out.push('\n');
        return Ok(out);
    }

    Ok(subtitle
        .iter()
        .map(|line| format!("{:?} {:?} {}\n", line.start, line.end, line.text))
        .collect())
}
