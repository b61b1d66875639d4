//! # Stream Probe Module
//!
//! Analisi dei file video con ffprobe.
//!
//! ## Responsabilità:
//! - Invoca `ffprobe -print_format json -show_streams` per ogni file
//! - Interpreta l'output JSON con `serde_json`
//! - Classifica gli stream in video / audio / sottotitoli
//! - Determina il codec dello stream video principale
//!
//! Un probe fallito (exit status non zero, JSON non valido, nessuno stream
//! video) esclude solo quel file: il batch continua.

use crate::error::ConvertError;
use crate::platform::PlatformCommands;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Subtitle codecs that cannot be stream-copied into an mp4 container
const TEXT_SUBTITLE_CODECS: &[&str] = &["subrip", "srt", "ass", "ssa", "webvtt", "text"];

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    disposition: Option<FfprobeDisposition>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeDisposition {
    #[serde(default)]
    attached_pic: u8,
}

/// Classification of a single stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

/// One classified stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub index: usize,
    pub codec_name: String,
    pub kind: StreamKind,
}

/// Parsed prober output for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Codec of the primary video stream
    pub codec: String,
    /// Frame size of the primary video stream, when ffprobe reports it
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_streams: Vec<StreamInfo>,
    pub audio_streams: Vec<StreamInfo>,
    pub subtitle_streams: Vec<StreamInfo>,
}

impl ProbeResult {
    /// Parse ffprobe's JSON output
    pub fn from_json(path: &Path, json: &[u8]) -> Result<Self, ConvertError> {
        let parsed: FfprobeOutput = serde_json::from_slice(json)
            .map_err(|e| ConvertError::probe(path, format!("unparsable output: {}", e)))?;

        let mut video_streams = Vec::new();
        let mut audio_streams = Vec::new();
        let mut subtitle_streams = Vec::new();
        let mut primary: Option<(String, Option<u32>, Option<u32>)> = None;

        for stream in parsed.streams {
            let codec_name = stream.codec_name.unwrap_or_default();
            let kind = match stream.codec_type.as_deref() {
                Some("video") => StreamKind::Video,
                Some("audio") => StreamKind::Audio,
                Some("subtitle") => StreamKind::Subtitle,
                _ => continue,
            };

            let is_cover_art = stream
                .disposition
                .map(|d| d.attached_pic == 1)
                .unwrap_or(false);
            if kind == StreamKind::Video && primary.is_none() && !is_cover_art && !codec_name.is_empty() {
                primary = Some((codec_name.clone(), stream.width, stream.height));
            }

            let info = StreamInfo {
                index: stream.index,
                codec_name,
                kind,
            };
            match kind {
                StreamKind::Video => video_streams.push(info),
                StreamKind::Audio => audio_streams.push(info),
                StreamKind::Subtitle => subtitle_streams.push(info),
            }
        }

        let (codec, width, height) = primary.ok_or_else(|| ConvertError::probe(path, "no video stream"))?;

        Ok(Self {
            codec,
            width,
            height,
            video_streams,
            audio_streams,
            subtitle_streams,
        })
    }

    /// True if any subtitle stream is text-based (needs `mov_text` in mp4)
    pub fn has_text_subtitles(&self) -> bool {
        self.subtitle_streams.iter().any(|s| {
            TEXT_SUBTITLE_CODECS
                .iter()
                .any(|c| s.codec_name.eq_ignore_ascii_case(c))
        })
    }
}

/// External media prober (ffprobe in production, fakes in tests)
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, ConvertError>;
}

/// `MediaProber` backed by ffprobe
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProber;

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbeResult, ConvertError> {
        let platform = PlatformCommands::instance();
        let ffprobe_cmd = platform.get_command("ffprobe");

        let output = Command::new(ffprobe_cmd)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .await
            .map_err(|e| ConvertError::probe(path, format!("failed to execute {}: {}", ffprobe_cmd, e)))?;

        if !output.status.success() {
            return Err(ConvertError::probe(
                path,
                format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let result = ProbeResult::from_json(path, &output.stdout)?;
        debug!(
            "Probed {}: codec={} width={:?} video={} audio={} subtitles={}",
            path.display(),
            result.codec,
            result.width,
            result.video_streams.len(),
            result.audio_streams.len(),
            result.subtitle_streams.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MKV_PROBE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "mjpeg", "codec_type": "video", "width": 600, "height": 600, "disposition": {"attached_pic": 1}},
            {"index": 1, "codec_name": "h264", "codec_type": "video", "width": 3840, "height": 1608, "disposition": {"attached_pic": 0}},
            {"index": 2, "codec_name": "aac", "codec_type": "audio"},
            {"index": 3, "codec_name": "ac3", "codec_type": "audio"},
            {"index": 4, "codec_name": "subrip", "codec_type": "subtitle"},
            {"index": 5, "codec_type": "attachment"}
        ]
    }"#;

    #[test]
    fn test_parse_classifies_streams() {
        let result = ProbeResult::from_json(Path::new("movie.mkv"), MKV_PROBE.as_bytes()).unwrap();
        assert_eq!(result.codec, "h264");
        assert_eq!(result.width, Some(3840));
        assert_eq!(result.height, Some(1608));
        assert_eq!(result.video_streams.len(), 2);
        assert_eq!(result.audio_streams.len(), 2);
        assert_eq!(result.subtitle_streams.len(), 1);
        assert_eq!(result.subtitle_streams[0].index, 4);
        assert!(result.has_text_subtitles());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = ProbeResult::from_json(Path::new("x.mp4"), b"not json").unwrap_err();
        assert!(matches!(err, ConvertError::Probe { .. }));
    }

    #[test]
    fn test_audio_only_is_probe_failure() {
        let json = r#"{"streams": [{"index": 0, "codec_name": "aac", "codec_type": "audio"}]}"#;
        let err = ProbeResult::from_json(Path::new("song.m4a"), json.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("no video stream"));
    }

    #[test]
    fn test_bitmap_subtitles_are_copied() {
        let json = r#"{"streams": [
            {"index": 0, "codec_name": "hevc", "codec_type": "video"},
            {"index": 1, "codec_name": "hdmv_pgs_subtitle", "codec_type": "subtitle"}
        ]}"#;
        let result = ProbeResult::from_json(Path::new("a.mkv"), json.as_bytes()).unwrap();
        assert_eq!(result.codec, "hevc");
        assert_eq!(result.width, None);
        assert!(!result.has_text_subtitles());
    }
}
