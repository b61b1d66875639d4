//! # Batch Planner Module
//!
//! Combina discovery e probing per calcolare quali file vanno convertiti,
//! poi guida il loop sequenziale delle transazioni di conversione.
//!
//! ## Flusso:
//! 1. Estensioni: lista esplicita o survey della directory
//! 2. Discovery dei file candidati
//! 3. Probe di ogni file: già nel codec target → saltato, probe fallito →
//!    escluso con warning, altrimenti → da convertire. In modalità
//!    riduzione risoluzione (`max_width`) il criterio è la larghezza del
//!    video invece del codec
//! 4. Loop sequenziale: una transazione completa per file, un solo
//!    `BatchState` per tutto il batch

use crate::config::{normalize_extension, Config};
use crate::converter::conversion_task::{ConversionJob, ConversionTransaction};
use crate::converter::progress_tracker::ProgressTracker;
use crate::encoder::{BatchState, CodecFamily, EncoderSelector, SubtitleMode, Transcoder};
use crate::error::ConvertError;
use crate::file_manager::{ContentType, DiscoveredFile, FileManager};
use crate::file_ops::FileOps;
use crate::probe::{MediaProber, ProbeResult};
use crate::progress::ConversionStats;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A discovered candidate, annotated during probing
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub path: PathBuf,
    pub extension: Option<String>,
    /// Sniffed content type; `None` when extensions were trusted
    pub content_type: Option<ContentType>,
    pub probe: Option<ProbeResult>,
}

impl From<DiscoveredFile> for VideoFile {
    fn from(found: DiscoveredFile) -> Self {
        Self {
            content_type: found.content_type,
            ..Self::new(found.path)
        }
    }
}

impl VideoFile {
    pub fn new(path: PathBuf) -> Self {
        let extension = FileManager::extension_of(&path);
        Self {
            path,
            extension,
            content_type: None,
            probe: None,
        }
    }

    /// Codec of the primary video stream, once probed
    pub fn codec(&self) -> Option<&str> {
        self.probe.as_ref().map(|p| p.codec.as_str())
    }

    fn subtitle_mode(&self, family: CodecFamily) -> SubtitleMode {
        let text_subs = self
            .probe
            .as_ref()
            .map(ProbeResult::has_text_subtitles)
            .unwrap_or(false);
        if text_subs && family.container() == "mp4" {
            SubtitleMode::MovText
        } else {
            SubtitleMode::Copy
        }
    }
}

/// Result of discovery + probing
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub discovered: Vec<PathBuf>,
    /// Needing no work: already in the target codec, or within the width limit
    pub already_target: Vec<PathBuf>,
    pub probe_failures: Vec<(PathBuf, String)>,
    pub to_convert: Vec<VideoFile>,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.to_convert.is_empty()
    }

    /// Seed statistics for the execution phase
    pub fn stats(&self) -> ConversionStats {
        ConversionStats {
            files_discovered: self.discovered.len(),
            files_already_target: self.already_target.len(),
            probe_failures: self.probe_failures.len(),
            files_to_convert: self.to_convert.len(),
            ..Default::default()
        }
    }
}

/// Plans and drives one batch
pub struct BatchPlanner<'a> {
    config: &'a Config,
    prober: &'a dyn MediaProber,
    transcoder: &'a dyn Transcoder,
    file_ops: &'a dyn FileOps,
    selector: EncoderSelector,
}

impl<'a> BatchPlanner<'a> {
    pub fn new(
        config: &'a Config,
        prober: &'a dyn MediaProber,
        transcoder: &'a dyn Transcoder,
        file_ops: &'a dyn FileOps,
    ) -> Self {
        let selector = match config.forced_encoder {
            Some(ref encoder) => EncoderSelector::forced(encoder.clone(), config.fallback_policy),
            None => EncoderSelector::new(config.target_codec, config.fallback_policy),
        };
        Self {
            config,
            prober,
            transcoder,
            file_ops,
            selector,
        }
    }

    /// Replace the encoder candidate list
    pub fn with_selector(mut self, selector: EncoderSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn selector(&self) -> &EncoderSelector {
        &self.selector
    }

    /// Extensions to look for: the configured list, or every extension present
    pub fn resolve_extensions(&self, root: &Path) -> Vec<String> {
        if self.config.all_extensions {
            let surveyed: Vec<String> = FileManager::survey_extensions(root, self.config.recursive).collect();
            debug!("Surveyed extensions: {:?}", surveyed);
            surveyed
        } else {
            self.config
                .extensions
                .iter()
                .map(|e| normalize_extension(e))
                .filter(|e| !e.is_empty())
                .collect()
        }
    }

    /// Candidate video files under `root`
    pub fn discover(&self, root: &Path) -> Vec<VideoFile> {
        let extensions = self.resolve_extensions(root);
        FileManager::discover_videos(root, self.config.recursive, &extensions, self.config.trust_extensions)
            .map(VideoFile::from)
            .collect()
    }

    /// Discover and probe, splitting files into skip / failure / work sets
    pub async fn plan(&self, root: &Path) -> BatchPlan {
        let candidates = self.discover(root);
        info!("Found {} video files in {}", candidates.len(), root.display());

        let mut plan = BatchPlan::default();

        for mut file in candidates {
            plan.discovered.push(file.path.clone());

            let probed = self
                .prober
                .probe(&file.path)
                .await
                .and_then(|result| self.needs_work(&file.path, &result).map(|needed| (result, needed)));

            match probed {
                Ok((result, needs_work)) => {
                    let already_target = !needs_work;
                    debug!(
                        "{}: codec {} width {:?} ({})",
                        file.path.display(),
                        result.codec,
                        result.width,
                        if already_target { "skip" } else { "convert" }
                    );
                    file.probe = Some(result);
                    if already_target {
                        plan.already_target.push(file.path);
                    } else {
                        plan.to_convert.push(file);
                    }
                }
                Err(e) => {
                    warn!("⚠️ Couldn't probe {}: {}", file.path.display(), e);
                    plan.probe_failures.push((file.path, e.to_string()));
                }
            }
        }

        plan
    }

    /// Whether a probed file belongs in the work set
    fn needs_work(&self, path: &Path, result: &ProbeResult) -> Result<bool, ConvertError> {
        match self.config.max_width {
            Some(max_width) => result
                .width
                .map(|width| width > max_width)
                .ok_or_else(|| ConvertError::probe(path, "no video width")),
            None => Ok(!self.config.target_codec.matches(&result.codec)),
        }
    }

    /// Run the per-file transactions sequentially
    pub async fn execute(&self, plan: &BatchPlan, mut tracker: ProgressTracker) -> (ConversionStats, BatchState) {
        let start = Instant::now();
        let family = self.config.target_codec;
        let mut state = BatchState::new(family);
        let transaction = ConversionTransaction::new(&self.selector, self.transcoder, self.file_ops);

        for file in &plan.to_convert {
            tracker.file_started(&file.path);
            let job = ConversionJob::new(file.path.clone(), self.config.destructive, family)
                .with_subtitles(file.subtitle_mode(family))
                .with_max_width(self.config.max_width);

            if self.config.dry_run {
                match transaction.dry_run(&job, &state) {
                    Ok(report) => tracker.file_planned(&report),
                    Err(e) => tracker.file_failed(&file.path, &e),
                }
                continue;
            }

            let original_size = file_size(&file.path).await;
            match transaction.run(&job, &mut state).await {
                Ok(published) => {
                    let converted_size = file_size(&published.destination).await;
                    info!(
                        "✅ {} -> {} ({})",
                        published.source.display(),
                        published.destination.display(),
                        published.encoder
                    );
                    tracker.file_published(&published, original_size, converted_size);
                }
                Err(e) => {
                    error!("❌ {}", e);
                    tracker.file_failed(&file.path, &e);
                }
            }
        }

        let stats = tracker.finish(state.pinned(), start.elapsed().as_secs_f64());
        (stats, state)
    }
}

async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}
