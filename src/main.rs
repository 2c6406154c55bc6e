use clap::{Parser, Subcommand};
use std::path::PathBuf;
use surface_recorder::commands::{preset, recording, snapshot};

#[derive(Parser)]
#[command(name = "surface-recorder")]
#[command(author, version)]
#[command(about = "Record a live rendering surface into a downloadable video")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Record the test pattern and save the result
    Record {
        /// Maximum length in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Base name of the saved file
        #[arg(short, long)]
        name: Option<String>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pattern preset to render
        #[arg(long)]
        preset: Option<PathBuf>,

        #[arg(long, default_value_t = 1280)]
        width: u32,

        #[arg(long, default_value_t = 720)]
        height: u32,

        /// Keep the native format instead of converting
        #[arg(long)]
        no_transcode: bool,

        /// Download directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// FFmpeg executable
        #[arg(long, env = "SURFACE_RECORDER_FFMPEG", default_value = "ffmpeg")]
        ffmpeg: PathBuf,
    },

    /// Save one frame of the test pattern as a PNG
    Snapshot {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Pattern preset to render
        #[arg(long)]
        preset: Option<PathBuf>,

        #[arg(long, default_value_t = 1280)]
        width: u32,

        #[arg(long, default_value_t = 720)]
        height: u32,

        /// Frame index to render
        #[arg(long, default_value_t = 0)]
        frame: u64,
    },

    /// Save or load pattern presets
    Preset {
        #[command(subcommand)]
        action: PresetAction,
    },
}

#[derive(Debug, Subcommand)]
enum PresetAction {
    /// Save settings to `<dir>/<name>.json`
    Save {
        /// Preset name
        #[arg(short, long)]
        name: Option<String>,

        /// Settings as a JSON object (defaults to the built-in pattern)
        #[arg(short, long)]
        settings: Option<String>,

        /// Target directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Print a preset's settings
    Load {
        /// Preset file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    surface_recorder::init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Record {
            duration,
            name,
            config,
            preset,
            width,
            height,
            no_transcode,
            out,
            ffmpeg,
        } => {
            recording::run_record(recording::RecordOptions {
                config,
                duration,
                name,
                width,
                height,
                transcode: !no_transcode,
                out,
                ffmpeg,
                preset,
            })
            .await?;
        }
        Commands::Snapshot {
            out,
            preset,
            width,
            height,
            frame,
        } => {
            let pattern = recording::load_pattern(preset.as_ref())?;
            snapshot::run_snapshot(pattern, width, height, frame, &out)?;
        }
        Commands::Preset { action } => match action {
            PresetAction::Save { name, settings, dir } => {
                preset::run_preset_save(&dir, name.as_deref(), settings.as_deref())?;
            }
            PresetAction::Load { path } => {
                preset::run_preset_load(&path)?;
            }
        },
    }

    Ok(())
}
