//! # Video Processing Module
//!
//! Questo modulo esegue la transcodifica vera e propria con FFmpeg.
//!
//! ## Responsabilità:
//! - Costruzione della command line ffmpeg per un singolo tentativo
//! - Esecuzione di ffmpeg e traduzione dell'exit status in `TranscodeOutcome`
//! - Verifica dipendenze esterne (ffmpeg, ffprobe)
//!
//! ## Pipeline ffmpeg:
//! - `-map 0`: tutti gli stream del file sorgente
//! - `-map_metadata 0` + `-movflags use_metadata_tags`: preserva i tag
//! - `-c copy`: audio e sottotitoli copiati senza ricodifica
//! - `-c:v <encoder>`: solo il video viene ricodificato
//! - `-c:s mov_text`: solo se ci sono sottotitoli testuali (mp4 non li accetta)
//! - `-vf scale=<w>:-2`: solo in modalità riduzione risoluzione
//!
//! ## Esempio:
//! ```rust,ignore
//! let processor = VideoProcessor::new();
//! let outcome = processor.transcode(&request).await?;
//! ```

use crate::args;
use crate::encoder::{SubtitleMode, TranscodeOutcome, TranscodeRequest, Transcoder};
use crate::platform::PlatformCommands;
use anyhow::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs ffmpeg transcodes
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoProcessor;

impl VideoProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Arguments passed to ffmpeg for one attempt, without the program name.
    /// Paths are passed through untouched, so non UTF-8 names survive.
    pub fn build_args(request: &TranscodeRequest<'_>, verbose: bool) -> Vec<OsString> {
        let mut args = os_args(args![
            "-hide_banner",
            "-nostdin",
            "-y",
            "-loglevel",
            if verbose { "info" } else { "error" },
            "-i",
        ]);
        args.push(request.source.as_os_str().to_os_string());
        args.extend(os_args(args![
            "-map",
            "0",
            "-map_metadata",
            "0",
            "-c",
            "copy",
            "-c:v",
            request.encoder,
        ]));

        if let Some(width) = request.options.scale_width {
            args.extend(os_args(args!["-vf", format!("scale={}:-2", width)]));
        }

        if request.options.subtitles == SubtitleMode::MovText {
            args.extend(os_args(args!["-c:s", "mov_text"]));
        }

        if request.family.container() == "mp4" {
            args.extend(os_args(args!["-movflags", "use_metadata_tags"]));
        }

        args.push(request.output.as_os_str().to_os_string());
        args
    }

    /// Render a command line for logs and dry-run reports
    pub fn render_command(request: &TranscodeRequest<'_>) -> String {
        let platform = PlatformCommands::instance();
        let mut rendered = platform.get_command("ffmpeg").to_string();
        for arg in Self::build_args(request, false) {
            let arg = arg.to_string_lossy();
            rendered.push(' ');
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                rendered.push_str(&format!("\"{}\"", arg));
            } else {
                rendered.push_str(&arg);
            }
        }
        rendered
    }

    /// Check if required tools are available
    pub async fn check_dependencies(include_ffmpeg: bool) -> Result<()> {
        let platform = PlatformCommands::instance();
        if include_ffmpeg {
            platform.require(&["ffprobe", "ffmpeg"]).await?;
        } else {
            platform.require(&["ffprobe"]).await?;
        }
        Ok(())
    }
}

fn os_args(items: Vec<String>) -> Vec<OsString> {
    items.into_iter().map(OsString::from).collect()
}

#[async_trait]
impl Transcoder for VideoProcessor {
    async fn transcode(&self, request: &TranscodeRequest<'_>) -> Result<TranscodeOutcome> {
        let platform = PlatformCommands::instance();
        let ffmpeg_cmd = platform.get_command("ffmpeg");
        let verbose = tracing::enabled!(tracing::Level::DEBUG);

        debug!("🎬 {}", Self::render_command(request));
        let start_time = std::time::Instant::now();

        let output = Command::new(ffmpeg_cmd)
            .args(Self::build_args(request, verbose))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to execute {}: {}", ffmpeg_cmd, e))?;

        let duration = start_time.elapsed();

        if !output.status.success() {
            debug!(
                "❌ {} failed after {:.1}s: {}",
                request.encoder,
                duration.as_secs_f64(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(TranscodeOutcome::failed(output.status.to_string()));
        }

        debug!(
            "✅ {} finished {} in {:.1}s",
            request.encoder,
            request.source.display(),
            duration.as_secs_f64()
        );
        Ok(TranscodeOutcome {
            success: true,
            status: output.status.to_string(),
        })
    }
}
