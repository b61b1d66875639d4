//! # Video Batch Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Merge tra file di configurazione e flag CLI
//! - Avvio del converter e gestione degli errori fatali
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging su stderr (INFO, o DEBUG con --verbose)
//! 3. Carica l'eventuale file di configurazione e applica i flag
//! 4. Istanzia MediaConverter e avvia il batch
//!
//! ## Esempio di utilizzo:
//! ```bash
//! video-batch-convert /path/to/videos -r -e mkv,avi --codec hevc --nondestructive
//! video-batch-convert /path/to/movies -r --max-width 1920 --dry-run
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use video_batch_converter::{
    config::Config, json_output::JsonMessage, platform::PlatformCommands, CodecFamily, ConvertError,
    FallbackPolicy, MediaConverter,
};

#[derive(Parser)]
#[command(name = "video-batch-convert")]
#[command(about = "Batch re-encode the video streams of a directory to a single codec")]
struct Args {
    /// Directory containing the videos to convert
    directory: PathBuf,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Comma separated extensions to look for (default: mp4,m4a,mkv,ts,avi)
    #[arg(short = 'e', long = "file-ext")]
    file_ext: Option<String>,

    /// Consider every extension present in the directory
    #[arg(long)]
    all_exts: bool,

    /// Select files by extension only, without checking their content
    #[arg(long)]
    trust_extensions: bool,

    /// Target codec: hevc, h264 or av1
    #[arg(short, long)]
    codec: Option<String>,

    /// Keep the source files, writing the result next to them
    #[arg(short, long)]
    nondestructive: bool,

    /// Print what would be done without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Use only this ffmpeg encoder (e.g. hevc_nvenc)
    #[arg(long)]
    encoder: Option<String>,

    /// After the chosen encoder fails, try the whole list again on the next file
    #[arg(long)]
    reprobe_on_failure: bool,

    /// Downscale mode: re-encode only videos wider than this many pixels
    /// (e.g. 1920), writing "<name> - 1080p.mp4" next to the original
    #[arg(long, value_name = "PIXELS")]
    max_width: Option<u32>,

    /// JSON configuration file; command line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit JSON lines on stdout instead of the progress bar
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Overlay command line flags on a base configuration
    fn apply_to(&self, mut config: Config) -> Result<Config> {
        if let Some(ref list) = self.file_ext {
            config.extensions = Config::parse_extensions(list);
        }
        if let Some(ref codec) = self.codec {
            config.target_codec = codec.parse::<CodecFamily>()?;
        }
        if let Some(ref encoder) = self.encoder {
            config.forced_encoder = Some(encoder.clone());
        }
        if self.max_width.is_some() {
            config.max_width = self.max_width;
        }
        if self.reprobe_on_failure {
            config.fallback_policy = FallbackPolicy::ReprobeOnFailure;
        }

        config.all_extensions |= self.all_exts;
        config.recursive |= self.recursive;
        config.trust_extensions |= self.trust_extensions;
        config.destructive &= !self.nondestructive;
        config.dry_run |= self.dry_run;
        config.assume_yes |= self.yes;
        config.json_output |= self.json;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Log su stderr: stdout è riservato al report e agli eventi JSON
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("{}", PlatformCommands::system_info());

    let json = args.json;
    let result = run(args).await;

    if let Err(ref e) = result {
        if json {
            let details = e.downcast_ref::<ConvertError>().map(|ce| format!("{:?}", ce));
            JsonMessage::error(e.to_string(), details).emit();
        }
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let base = match args.config {
        Some(ref path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    let config = args.apply_to(base)?;

    let converter = MediaConverter::new(&args.directory, config)?;
    converter.run().await?;
    Ok(())
}
