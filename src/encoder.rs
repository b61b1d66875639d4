//! # Encoder Selection Module
//!
//! Gestisce le famiglie di codec target e la scelta dell'encoder ffmpeg.
//!
//! ## Responsabilità:
//! - `CodecFamily`: codec target (hevc, h264, av1) con lista ordinata di encoder
//! - `BatchState`: stato condiviso del batch con l'encoder "pinned"
//! - `EncoderSelector`: prova gli encoder in ordine di priorità finché uno
//!   riesce, poi lo fissa per tutto il resto del batch
//!
//! ## Ordine dei candidati:
//! Encoder hardware prima (NVIDIA, AMD, Intel, VAAPI, V4L2, Media Foundation,
//! VideoToolbox), encoder software per ultimo.
//!
//! ## Politica dopo il pinning:
//! Con `FallbackPolicy::Pinned` (default) un fallimento dell'encoder fissato
//! non riattiva la ricerca: il file fallisce e il batch continua con lo stesso
//! encoder. `FallbackPolicy::ReprobeOnFailure` invece rimuove il pin e rifà la
//! ricerca a partire dal file successivo.

use crate::error::ConvertError;
use crate::utils::to_string_vec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

const HEVC_ENCODERS: &[&str] = &[
    "hevc_nvenc",
    "hevc_amf",
    "hevc_qsv",
    "hevc_vaapi",
    "hevc_v4l2m2m",
    "hevc_mf",
    "hevc_videotoolbox",
    "libx265",
];

const H264_ENCODERS: &[&str] = &[
    "h264_nvenc",
    "h264_amf",
    "h264_qsv",
    "h264_vaapi",
    "h264_v4l2m2m",
    "h264_mf",
    "h264_videotoolbox",
    "libx264",
];

const AV1_ENCODERS: &[&str] = &[
    "av1_nvenc",
    "av1_amf",
    "av1_qsv",
    "av1_vaapi",
    "libsvtav1",
    "libaom-av1",
];

/// Target codec family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecFamily {
    Hevc,
    H264,
    Av1,
}

impl Default for CodecFamily {
    fn default() -> Self {
        Self::Hevc
    }
}

impl CodecFamily {
    /// Codec name as reported by ffprobe's `codec_name`
    pub fn codec_name(&self) -> &'static str {
        match self {
            Self::Hevc => "hevc",
            Self::H264 => "h264",
            Self::Av1 => "av1",
        }
    }

    /// Container extension every family is published in
    pub fn container(&self) -> &'static str {
        "mp4"
    }

    /// Encoder backends, highest priority first
    pub fn encoder_candidates(&self) -> &'static [&'static str] {
        match self {
            Self::Hevc => HEVC_ENCODERS,
            Self::H264 => H264_ENCODERS,
            Self::Av1 => AV1_ENCODERS,
        }
    }

    /// True if a probed codec name already satisfies this family
    pub fn matches(&self, codec_name: &str) -> bool {
        codec_name.eq_ignore_ascii_case(self.codec_name())
    }
}

impl FromStr for CodecFamily {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hevc" | "h265" | "x265" => Ok(Self::Hevc),
            "h264" | "avc" | "x264" => Ok(Self::H264),
            "av1" => Ok(Self::Av1),
            other => Err(ConvertError::UnknownCodec(other.to_string())),
        }
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec_name())
    }
}

/// What to do after the pinned encoder fails on a later file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Keep the pinned encoder; the failing file is simply reported
    #[default]
    Pinned,
    /// Unpin, so the next file searches the candidate list again
    ReprobeOnFailure,
}

/// Mutable state shared across the per-file loop of one batch
#[derive(Debug, Clone)]
pub struct BatchState {
    family: CodecFamily,
    pinned: Option<String>,
}

impl BatchState {
    pub fn new(family: CodecFamily) -> Self {
        Self {
            family,
            pinned: None,
        }
    }

    pub fn family(&self) -> CodecFamily {
        self.family
    }

    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    fn pin(&mut self, encoder: &str) {
        info!("📌 Pinned encoder {} for the rest of the batch", encoder);
        self.pinned = Some(encoder.to_string());
    }

    fn unpin(&mut self) {
        if let Some(previous) = self.pinned.take() {
            warn!("Unpinned encoder {}, next file will search again", previous);
        }
    }
}

/// Outcome of a single transcoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub success: bool,
    /// Human-readable exit status, e.g. "exit status: 1"
    pub status: String,
}

impl TranscodeOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            status: "exit status: 0".to_string(),
        }
    }

    pub fn failed(status: impl Into<String>) -> Self {
        Self {
            success: false,
            status: status.into(),
        }
    }
}

/// Subtitle handling requested from the transcoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubtitleMode {
    /// Stream copy, untouched
    #[default]
    Copy,
    /// Text subtitles the target container cannot carry as-is
    MovText,
}

/// Per-file stream handling, identical for every encoder attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamOptions {
    pub subtitles: SubtitleMode,
    /// Downscale the video to this width, keeping the aspect ratio
    pub scale_width: Option<u32>,
}

/// Everything the transcoder needs for one attempt
#[derive(Debug, Clone, Copy)]
pub struct TranscodeRequest<'a> {
    pub source: &'a Path,
    pub output: &'a Path,
    pub encoder: &'a str,
    pub family: CodecFamily,
    pub options: StreamOptions,
}

/// External transcoder (ffmpeg in production, fakes in tests)
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one transcode. `Err` only when the process could not be run at all.
    async fn transcode(&self, request: &TranscodeRequest<'_>) -> anyhow::Result<TranscodeOutcome>;
}

/// Resolves and pins the encoder backend for a batch
#[derive(Debug, Clone)]
pub struct EncoderSelector {
    candidates: Vec<String>,
    policy: FallbackPolicy,
}

impl EncoderSelector {
    pub fn new(family: CodecFamily, policy: FallbackPolicy) -> Self {
        Self {
            candidates: to_string_vec(family.encoder_candidates()),
            policy,
        }
    }

    /// Use a single user-chosen backend instead of the family list
    pub fn forced(encoder: impl Into<String>, policy: FallbackPolicy) -> Self {
        Self {
            candidates: vec![encoder.into()],
            policy,
        }
    }

    pub fn with_candidates(candidates: Vec<String>, policy: FallbackPolicy) -> Self {
        Self { candidates, policy }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Transcode `source` into `output`, using the pinned encoder if there is one,
    /// otherwise searching the candidates in order and pinning the first success.
    ///
    /// Returns the encoder that produced `output`.
    pub async fn transcode_with_fallback(
        &self,
        state: &mut BatchState,
        transcoder: &dyn Transcoder,
        source: &Path,
        output: &Path,
        options: StreamOptions,
    ) -> Result<String, ConvertError> {
        if let Some(pinned) = state.pinned().map(str::to_string) {
            debug!("Using pinned encoder {} for {}", pinned, source.display());
            let request = TranscodeRequest {
                source,
                output,
                encoder: &pinned,
                family: state.family(),
                options,
            };
            let outcome = run_attempt(transcoder, &request).await;
            if outcome.success {
                return Ok(pinned);
            }

            if self.policy == FallbackPolicy::ReprobeOnFailure {
                state.unpin();
            }
            return Err(ConvertError::Transcode {
                path: source.to_path_buf(),
                encoder: pinned,
                status: outcome.status,
            });
        }

        let mut tried = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            debug!("Trying encoder {} on {}", candidate, source.display());
            let request = TranscodeRequest {
                source,
                output,
                encoder: candidate,
                family: state.family(),
                options,
            };
            let outcome = run_attempt(transcoder, &request).await;
            if outcome.success {
                state.pin(candidate);
                return Ok(candidate.clone());
            }
            debug!("Encoder {} failed: {}", candidate, outcome.status);
            tried.push(candidate.clone());
        }

        Err(ConvertError::EncoderExhausted {
            path: source.to_path_buf(),
            tried,
        })
    }
}

async fn run_attempt(transcoder: &dyn Transcoder, request: &TranscodeRequest<'_>) -> TranscodeOutcome {
    match transcoder.transcode(request).await {
        Ok(outcome) => outcome,
        Err(e) => TranscodeOutcome::failed(e.to_string()),
    }
}
