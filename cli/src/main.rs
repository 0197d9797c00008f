//! stagehand - offline classification, conflict previews and activations
//! against an exported library snapshot.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Preset activation for animation mods")]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the cache and ledger files, overriding the config
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a package from asset paths and changed-item names
    Classify {
        paths: Vec<String>,
        /// Host changed-item name; repeatable
        #[arg(short, long = "item")]
        items: Vec<String>,
    },
    /// Scan a library snapshot into the cache
    Scan {
        #[arg(short, long)]
        library: PathBuf,
        /// Discard the cache and reclassify everything
        #[arg(short, long)]
        force: bool,
    },
    /// Show which packages a preset would suppress
    Conflicts {
        #[arg(short, long)]
        library: PathBuf,
        #[arg(short, long)]
        presets: PathBuf,
        preset: String,
    },
    /// Activate a preset against a library snapshot
    Activate {
        #[arg(short, long)]
        library: PathBuf,
        #[arg(short, long)]
        presets: PathBuf,
        preset: String,
        #[arg(long)]
        variant: Option<String>,
    },
    /// List commands that can be bound to a preset
    Commands,
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    // If STAGEHAND_LOG_PATH is set, append to that file
    if let Ok(path) = std::env::var("STAGEHAND_LOG_PATH") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref(), cli.data_dir.as_deref());
    let result = match cli.command {
        Commands::Classify { paths, items } => commands::classify(&config, &paths, &items),
        Commands::Scan { library, force } => commands::scan(config, &library, force).await,
        Commands::Conflicts {
            library,
            presets,
            preset,
        } => commands::conflicts(config, &library, &presets, &preset).await,
        Commands::Activate {
            library,
            presets,
            preset,
            variant,
        } => commands::activate(config, &library, &presets, &preset, variant.as_deref()).await,
        Commands::Commands => commands::list_commands(),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "Command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
