//! # Conversion Task Module
//!
//! Transazione di conversione per un singolo file.
//!
//! ## Sequenza:
//! 1. Transcodifica in un file temporaneo univoco nella stessa directory
//! 2. Copia di permessi e timestamp dal sorgente al file temporaneo
//! 3. Pubblicazione secondo il `PublishPlan` (overwrite, suffisso, nuova
//!    estensione, copia a risoluzione ridotta)
//!
//! Se un passo fallisce il file temporaneo viene rimosso e il sorgente resta
//! intatto. Il dry-run calcola le stesse decisioni senza toccare il filesystem.

use crate::converter::path_resolver::{PathResolver, PublishPlan};
use crate::encoder::{BatchState, CodecFamily, EncoderSelector, StreamOptions, SubtitleMode, TranscodeRequest, Transcoder};
use crate::error::ConvertError;
use crate::file_ops::FileOps;
use crate::video_processor::VideoProcessor;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, error};

/// One file's unit of work
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub destructive: bool,
    pub family: CodecFamily,
    pub options: StreamOptions,
}

impl ConversionJob {
    pub fn new(source: impl Into<PathBuf>, destructive: bool, family: CodecFamily) -> Self {
        Self {
            source: source.into(),
            destructive,
            family,
            options: StreamOptions::default(),
        }
    }

    pub fn with_subtitles(mut self, subtitles: SubtitleMode) -> Self {
        self.options.subtitles = subtitles;
        self
    }

    /// Produce a reduced-resolution copy instead of a codec conversion
    pub fn with_max_width(mut self, max_width: Option<u32>) -> Self {
        self.options.scale_width = max_width;
        self
    }

    pub fn plan(&self) -> PublishPlan {
        match self.options.scale_width {
            Some(width) => PublishPlan::Downscaled { width },
            None => PublishPlan::decide(&self.source, self.destructive, self.family),
        }
    }

    pub fn destination(&self) -> Result<PathBuf, ConvertError> {
        PathResolver::final_path(&self.source, self.plan(), self.family)
    }

    /// Reserve a uniquely named temp file next to the source.
    /// The returned path deletes the file when dropped.
    fn reserve_temp(&self) -> Result<TempPath, ConvertError> {
        let dir = PathResolver::temp_dir(&self.source);
        let prefix = PathResolver::temp_prefix(&self.source);
        let suffix = PathResolver::temp_suffix(self.family);

        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(dir)?;
        Ok(temp.into_temp_path())
    }
}

/// A successfully published conversion
#[derive(Debug, Clone)]
pub struct PublishedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub encoder: String,
    pub plan: PublishPlan,
}

/// What a dry run would do for one file
#[derive(Debug, Clone)]
pub struct DryRunReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub plan: PublishPlan,
    /// Transcoder command lines, in the order they would be tried
    pub commands: Vec<String>,
    /// Filesystem actions after a successful transcode
    pub actions: Vec<String>,
}

/// Runs the transcode-then-publish sequence for single files
pub struct ConversionTransaction<'a> {
    selector: &'a EncoderSelector,
    transcoder: &'a dyn Transcoder,
    file_ops: &'a dyn FileOps,
}

impl<'a> ConversionTransaction<'a> {
    pub fn new(selector: &'a EncoderSelector, transcoder: &'a dyn Transcoder, file_ops: &'a dyn FileOps) -> Self {
        Self {
            selector,
            transcoder,
            file_ops,
        }
    }

    /// Convert and publish one file
    pub async fn run(&self, job: &ConversionJob, state: &mut BatchState) -> Result<PublishedFile, ConvertError> {
        let plan = job.plan();
        let destination = job.destination()?;

        if plan.keeps_source() && destination.exists() {
            return Err(ConvertError::DestinationExists(destination));
        }

        let temp = job.reserve_temp()?;
        debug!("Temp output for {}: {}", job.source.display(), temp.display());

        let encoder = self
            .selector
            .transcode_with_fallback(state, self.transcoder, &job.source, &temp, job.options)
            .await?;

        // Temp files are created owner-only
        self.file_ops.copy_permissions(&job.source, &temp).await?;
        self.file_ops.copy_timestamps(&job.source, &temp).await?;

        self.publish(job, plan, temp, &destination).await?;

        Ok(PublishedFile {
            source: job.source.clone(),
            destination,
            encoder,
            plan,
        })
    }

    async fn publish(
        &self,
        job: &ConversionJob,
        plan: PublishPlan,
        temp: TempPath,
        destination: &Path,
    ) -> Result<(), ConvertError> {
        match plan {
            PublishPlan::OverwriteInPlace => {
                self.file_ops.delete(&job.source).await?;
                if let Err(e) = self.file_ops.move_or_rename(&temp, destination).await {
                    // The source is gone; the converted file is the only copy left
                    match temp.keep() {
                        Ok(kept) => error!(
                            "Deleted {} but could not move {} into place: {}",
                            job.source.display(),
                            kept.display(),
                            e
                        ),
                        Err(keep_err) => error!("Failed to keep converted file: {}", keep_err),
                    }
                    return Err(e.into());
                }
            }
            PublishPlan::SiblingWithSuffix | PublishPlan::NewExtension | PublishPlan::Downscaled { .. } => {
                self.file_ops.move_or_rename(&temp, destination).await?;
            }
        }

        // The temp path no longer exists, dropping it is a no-op
        drop(temp);
        Ok(())
    }

    /// Report what `run` would do, without touching anything
    pub fn dry_run(&self, job: &ConversionJob, state: &BatchState) -> Result<DryRunReport, ConvertError> {
        let plan = job.plan();
        let destination = job.destination()?;
        let temp = PathResolver::temp_preview(&job.source, job.family);

        let encoders: Vec<&str> = match state.pinned() {
            Some(pinned) => vec![pinned],
            None => self.selector.candidates().iter().map(String::as_str).collect(),
        };
        let commands = encoders
            .into_iter()
            .map(|encoder| {
                VideoProcessor::render_command(&TranscodeRequest {
                    source: &job.source,
                    output: &temp,
                    encoder,
                    family: job.family,
                    options: job.options,
                })
            })
            .collect();

        let mut actions = vec![format!(
            "copy permissions and timestamps {} -> {}",
            job.source.display(),
            temp.display()
        )];
        if plan == PublishPlan::OverwriteInPlace {
            actions.push(format!("delete {}", job.source.display()));
        } else if destination.exists() {
            actions.push(format!("fail: {} already exists", destination.display()));
        }
        actions.push(format!("move {} -> {}", temp.display(), destination.display()));

        Ok(DryRunReport {
            source: job.source.clone(),
            destination,
            plan,
            commands,
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{FallbackPolicy, TranscodeOutcome};
    use crate::file_ops::LocalFileOps;
    use async_trait::async_trait;
    use filetime::FileTime;
    use tempfile::TempDir;

    /// Writes "converted" into the output for working encoders
    struct FakeTranscoder {
        working: Vec<&'static str>,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(&self, request: &TranscodeRequest<'_>) -> anyhow::Result<TranscodeOutcome> {
            if self.working.iter().any(|w| *w == request.encoder) {
                tokio::fs::write(request.output, b"converted").await?;
                Ok(TranscodeOutcome::ok())
            } else {
                // A failing ffmpeg can leave a partial file behind
                tokio::fs::write(request.output, b"partial").await?;
                Ok(TranscodeOutcome::failed("exit status: 1"))
            }
        }
    }

    fn selector() -> EncoderSelector {
        EncoderSelector::with_candidates(vec!["hw".to_string(), "sw".to_string()], FallbackPolicy::Pinned)
    }

    fn source_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, b"original").unwrap();
        let old = FileTime::from_unix_time(1_400_000_000, 0);
        filetime::set_file_times(&path, old, old).unwrap();
        path
    }

    fn dir_entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_destructive_replaces_source_and_keeps_timestamps() {
        let dir = TempDir::new().unwrap();
        let source = source_file(&dir, "movie.avi");
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec!["sw"] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let mut state = BatchState::new(CodecFamily::Hevc);

        let job = ConversionJob::new(&source, true, CodecFamily::Hevc);
        let published = tx.run(&job, &mut state).await.unwrap();

        assert_eq!(published.destination, source);
        assert_eq!(published.encoder, "sw");
        assert_eq!(std::fs::read(&source).unwrap(), b"converted");
        let meta = std::fs::metadata(&source).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            FileTime::from_unix_time(1_400_000_000, 0)
        );
        assert_eq!(dir_entries(&dir), vec!["movie.avi"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_published_file_keeps_source_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = source_file(&dir, "movie.avi");
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o644)).unwrap();
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec!["hw"] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let mut state = BatchState::new(CodecFamily::Hevc);

        let job = ConversionJob::new(&source, true, CodecFamily::Hevc);
        let published = tx.run(&job, &mut state).await.unwrap();

        let mode = std::fs::metadata(&published.destination).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        assert_eq!(std::fs::read(&source).unwrap(), b"converted");
    }

    #[tokio::test]
    async fn test_downscale_writes_tagged_sibling() {
        let dir = TempDir::new().unwrap();
        let source = source_file(&dir, "movie - 2160p.mkv");
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec!["hw"] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let mut state = BatchState::new(CodecFamily::Hevc);

        // The destructive flag does not apply to downscaled copies
        let job = ConversionJob::new(&source, true, CodecFamily::Hevc).with_max_width(Some(1920));
        let report = tx.dry_run(&job, &state).unwrap();
        assert!(report.commands.iter().all(|c| c.contains("-vf scale=1920:-2")));

        let published = tx.run(&job, &mut state).await.unwrap();
        assert_eq!(published.plan, PublishPlan::Downscaled { width: 1920 });
        assert_eq!(published.destination, dir.path().join("movie - 1080p.mp4"));
        assert_eq!(report.destination, published.destination);
        assert_eq!(std::fs::read(&source).unwrap(), b"original");
        assert_eq!(dir_entries(&dir), vec!["movie - 1080p.mp4", "movie - 2160p.mkv"]);
    }

    #[tokio::test]
    async fn test_nondestructive_mp4_gets_codec_suffix() {
        let dir = TempDir::new().unwrap();
        let source = source_file(&dir, "movie.mp4");
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec!["hw"] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let mut state = BatchState::new(CodecFamily::Hevc);

        let job = ConversionJob::new(&source, false, CodecFamily::Hevc);
        let published = tx.run(&job, &mut state).await.unwrap();

        assert_eq!(published.destination, dir.path().join("movie_hevc.mp4"));
        assert_eq!(std::fs::read(&source).unwrap(), b"original");
        assert_eq!(dir_entries(&dir), vec!["movie.mp4", "movie_hevc.mp4"]);
    }

    #[tokio::test]
    async fn test_nondestructive_other_container_gets_new_extension() {
        let dir = TempDir::new().unwrap();
        let source = source_file(&dir, "movie.avi");
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec!["hw"] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let mut state = BatchState::new(CodecFamily::Hevc);

        let job = ConversionJob::new(&source, false, CodecFamily::Hevc);
        tx.run(&job, &mut state).await.unwrap();

        assert_eq!(dir_entries(&dir), vec!["movie.avi", "movie.mp4"]);
        assert_eq!(std::fs::read(dir.path().join("movie.mp4")).unwrap(), b"converted");
    }

    #[tokio::test]
    async fn test_failed_transcode_leaves_directory_untouched() {
        let dir = TempDir::new().unwrap();
        let source = source_file(&dir, "movie.avi");
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec![] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let mut state = BatchState::new(CodecFamily::Hevc);

        let job = ConversionJob::new(&source, true, CodecFamily::Hevc);
        let err = tx.run(&job, &mut state).await.unwrap_err();

        assert!(matches!(err, ConvertError::EncoderExhausted { .. }));
        assert_eq!(dir_entries(&dir), vec!["movie.avi"]);
        assert_eq!(std::fs::read(&source).unwrap(), b"original");
        assert_eq!(state.pinned(), None);
    }

    #[tokio::test]
    async fn test_existing_destination_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let source = source_file(&dir, "movie.avi");
        std::fs::write(dir.path().join("movie.mp4"), b"someone else's file").unwrap();
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec!["hw"] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let mut state = BatchState::new(CodecFamily::Hevc);

        let job = ConversionJob::new(&source, false, CodecFamily::Hevc);
        let err = tx.run(&job, &mut state).await.unwrap_err();

        assert!(matches!(err, ConvertError::DestinationExists(_)));
        assert_eq!(
            std::fs::read(dir.path().join("movie.mp4")).unwrap(),
            b"someone else's file"
        );
        assert_eq!(dir_entries(&dir), vec!["movie.avi", "movie.mp4"]);
    }

    #[tokio::test]
    async fn test_dry_run_matches_real_destination() {
        for (name, destructive) in [("a.mp4", true), ("b.mp4", false), ("c.mkv", false), ("d.mkv", true)] {
            let dir = TempDir::new().unwrap();
            let source = source_file(&dir, name);
            let selector = selector();
            let transcoder = FakeTranscoder { working: vec!["hw"] };
            let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
            let job = ConversionJob::new(&source, destructive, CodecFamily::Hevc);

            let mut state = BatchState::new(CodecFamily::Hevc);
            let report = tx.dry_run(&job, &state).unwrap();
            assert_eq!(dir_entries(&dir), vec![name.to_string()]);

            let published = tx.run(&job, &mut state).await.unwrap();
            assert_eq!(report.destination, published.destination);
            assert_eq!(report.plan, published.plan);
        }
    }

    #[test]
    fn test_dry_run_lists_candidates_until_pinned() {
        let selector = selector();
        let transcoder = FakeTranscoder { working: vec![] };
        let tx = ConversionTransaction::new(&selector, &transcoder, &LocalFileOps);
        let job = ConversionJob::new("/videos/a.avi", true, CodecFamily::Hevc);

        let state = BatchState::new(CodecFamily::Hevc);
        let report = tx.dry_run(&job, &state).unwrap();
        assert_eq!(report.commands.len(), 2);
        assert!(report.commands[0].contains("-c:v hw"));
        assert!(report.actions.iter().any(|a| a.starts_with("delete /videos/a.avi")));
        assert!(report.actions.last().unwrap().ends_with("-> /videos/a.avi"));
    }
}
