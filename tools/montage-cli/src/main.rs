//! Montage CLI: create, edit, preview, and export timeline projects.
//!
//! Usage:
//!   montage init <NAME>              Create a new empty project
//!   montage info <PATH>              Show project information
//!   montage validate <PATH>          Validate a project
//!   montage import <PATH> <FILES>    Import media into a project
//!   montage edit <PATH> <ACTION>     Apply one timeline edit
//!   montage preview <PATH>           Play the timeline headlessly
//!   montage export <PATH>            Export a project to video
//!   montage check                    Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::edit::EditAction;

#[derive(Parser)]
#[command(
    name = "montage",
    about = "Timeline-based multi-track video compositor",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project
    Init {
        /// Project name
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Frame width
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Frame height
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Frames per second
        #[arg(long, default_value = "30")]
        fps: u32,
    },

    /// Show project information
    Info {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Validate a project
    Validate {
        /// Path to the project directory
        path: PathBuf,
    },

    /// Import media files into a project
    Import {
        /// Path to the project directory
        path: PathBuf,

        /// Media files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also place each imported asset on the timeline
        #[arg(long)]
        add: bool,
    },

    /// Apply one edit to a project's timeline
    Edit {
        /// Path to the project directory
        path: PathBuf,

        #[command(subcommand)]
        action: EditAction,
    },

    /// Play the timeline headlessly, or render a single frame
    Preview {
        /// Path to the project directory
        path: PathBuf,

        /// Start position (seconds)
        #[arg(long, default_value = "0.0")]
        from: f64,

        /// Stop after this many seconds of playback
        #[arg(long)]
        seconds: Option<f64>,

        /// Render the frame at `--from` to this PNG instead of playing
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Export a project to video
    Export {
        /// Path to the project directory
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Video codec: h264, h265, vp9, gif
        #[arg(long)]
        codec: Option<String>,

        /// Output frames per second (defaults to the project rate)
        #[arg(long)]
        fps: Option<u32>,

        /// Export from this time (seconds)
        #[arg(long)]
        start: Option<f64>,

        /// Export until this time (seconds)
        #[arg(long)]
        end: Option<f64>,

        /// Overwrite an existing output file
        #[arg(long)]
        overwrite: bool,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = montage_common::AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    montage_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Init {
            name,
            output,
            width,
            height,
            fps,
        } => commands::init::run(name, output, width, height, fps),
        Commands::Info { path } => commands::info::run(path),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Import { path, files, add } => commands::import::run(path, files, add, &config),
        Commands::Edit { path, action } => commands::edit::run(path, action, &config),
        Commands::Preview {
            path,
            from,
            seconds,
            snapshot,
        } => commands::preview::run(path, from, seconds, snapshot, &config).await,
        Commands::Export {
            path,
            output,
            codec,
            fps,
            start,
            end,
            overwrite,
        } => {
            let options = commands::export::ExportOptions {
                output,
                codec,
                fps,
                start,
                end,
                overwrite,
            };
            commands::export::run(path, options, &config)
        }
        Commands::Check => commands::check::run(),
    }
}
