use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use framelab::{MediaKind, Studio, StudioConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "framelab", version)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered operations for each media kind.
    Ops,
    /// Apply an image operation to a catalog source.
    Image(RunArgs),
    /// Transcode a catalog video with a per-frame operation (requires `ffmpeg` on PATH).
    Video(RunArgs),
    /// Show the most recent operations, newest first.
    History(HistoryArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Studio config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Source id to select (defaults to the config's `default_source`).
    #[arg(long)]
    source: Option<String>,

    /// Operation name.
    #[arg(long)]
    op: String,
}

#[derive(Parser, Debug)]
struct HistoryArgs {
    /// Studio config JSON.
    #[arg(long)]
    config: PathBuf,

    /// Maximum number of entries to print.
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Ops => cmd_ops(),
        Command::Image(args) => cmd_image(args),
        Command::Video(args) => cmd_video(args),
        Command::History(args) => cmd_history(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_studio(config: &std::path::Path) -> anyhow::Result<Studio> {
    let cfg = StudioConfig::load(config)
        .with_context(|| format!("load config '{}'", config.display()))?;
    Studio::open(&cfg).context("open studio")
}

fn cmd_ops() -> anyhow::Result<()> {
    for kind in [MediaKind::Image, MediaKind::Video] {
        let names: Vec<_> = framelab::operation_names(kind).collect();
        println!("{kind}: {}", names.join(", "));
    }
    Ok(())
}

fn cmd_image(args: RunArgs) -> anyhow::Result<()> {
    let studio = open_studio(&args.config)?;
    let mut session = studio.session()?;
    if let Some(id) = &args.source {
        session.select(id)?;
    }
    let artifact = studio
        .run_image(&session, &args.op)
        .with_context(|| format!("image operation '{}'", args.op))?;
    println!("{}", artifact.path.display());
    Ok(())
}

fn cmd_video(args: RunArgs) -> anyhow::Result<()> {
    let studio = open_studio(&args.config)?;
    let mut session = studio.session()?;
    if let Some(id) = &args.source {
        session.select(id)?;
    }
    let handle = studio.submit_video(&session, &args.op)?;
    let (artifact, stats) = handle
        .wait()
        .with_context(|| format!("video operation '{}'", args.op))?;
    println!("{}", artifact.path.display());
    eprintln!("frames: {}", stats.frames_written);
    Ok(())
}

fn cmd_history(args: HistoryArgs) -> anyhow::Result<()> {
    let studio = open_studio(&args.config)?;
    for entry in studio.history(args.limit)? {
        println!(
            "{}\t{}\t{}\t{}",
            entry.id,
            entry.timestamp.to_rfc3339(),
            entry.source_id,
            entry.operation
        );
    }
    Ok(())
}
