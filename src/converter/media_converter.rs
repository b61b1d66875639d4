//! # Media Converter Main Orchestrator
//!
//! Orchestratore principale che collega discovery, probing, conferma
//! dell'utente ed esecuzione del batch.
//!
//! ## Flusso:
//! 1. Controllo dipendenze (ffprobe sempre, ffmpeg solo se non dry-run)
//! 2. Pianificazione (`BatchPlanner::plan`) con spinner
//! 3. Report: TOTAL FILES FOUND / FILES TO PROCESS
//! 4. Conferma (`confirm_gate`): saltata in dry-run o con `--yes`
//! 5. Esecuzione sequenziale e statistiche finali

use crate::{
    config::Config,
    converter::{
        batch_planner::{BatchPlan, BatchPlanner},
        progress_tracker::ProgressTracker,
    },
    encoder::Transcoder,
    error::ConvertError,
    file_ops::{FileOps, LocalFileOps},
    json_output::{JsonConfig, JsonMessage},
    probe::{FfprobeProber, MediaProber},
    progress::{ConversionStats, ProgressManager},
    video_processor::VideoProcessor,
};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Decide whether the batch may proceed.
///
/// An empty work set is an error. Dry-run and `assume_yes` skip the prompt;
/// otherwise `confirm` is asked and anything but a yes aborts.
pub fn confirm_gate<F>(plan: &BatchPlan, config: &Config, confirm: F) -> Result<(), ConvertError>
where
    F: FnOnce() -> io::Result<bool>,
{
    if plan.is_empty() {
        return Err(ConvertError::NothingToProcess);
    }
    if config.dry_run || config.assume_yes {
        return Ok(());
    }
    if confirm()? {
        Ok(())
    } else {
        Err(ConvertError::Aborted)
    }
}

/// Ask on stderr, read a single answer line from stdin.
/// stdout stays free for the report and JSON events.
pub fn prompt_stdin() -> io::Result<bool> {
    prompt(&mut io::stdin().lock(), &mut io::stderr())
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<bool> {
    write!(output, "Do you want to continue? [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Orchestratore principale
pub struct MediaConverter {
    config: Config,
    input_dir: PathBuf,
    prober: Box<dyn MediaProber>,
    transcoder: Box<dyn Transcoder>,
    file_ops: Box<dyn FileOps>,
}

impl MediaConverter {
    /// Crea l'orchestratore con ffprobe/ffmpeg e il filesystem locale
    pub fn new(input_dir: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        if !input_dir.is_dir() {
            return Err(ConvertError::Validation(format!("Not a directory: {}", input_dir.display())).into());
        }

        Ok(Self {
            config,
            input_dir: input_dir.to_path_buf(),
            prober: Box::new(FfprobeProber),
            transcoder: Box::new(VideoProcessor::new()),
            file_ops: Box::new(LocalFileOps),
        })
    }

    /// Sostituisce i backend (test, integrazioni)
    pub fn with_backends(
        mut self,
        prober: Box<dyn MediaProber>,
        transcoder: Box<dyn Transcoder>,
        file_ops: Box<dyn FileOps>,
    ) -> Self {
        self.prober = prober;
        self.transcoder = transcoder;
        self.file_ops = file_ops;
        self
    }

    /// Esegue l'intero batch, chiedendo conferma su stdin
    pub async fn run(&self) -> Result<ConversionStats> {
        VideoProcessor::check_dependencies(!self.config.dry_run).await?;
        self.run_with_confirm(prompt_stdin).await
    }

    /// Esegue il batch con una funzione di conferma esplicita
    pub async fn run_with_confirm<F>(&self, confirm: F) -> Result<ConversionStats>
    where
        F: FnOnce() -> io::Result<bool>,
    {
        let planner = BatchPlanner::new(
            &self.config,
            self.prober.as_ref(),
            self.transcoder.as_ref(),
            self.file_ops.as_ref(),
        );

        let plan = self.plan_with_spinner(&planner).await;
        self.report_plan(&plan);

        confirm_gate(&plan, &self.config, confirm)?;

        if self.config.dry_run && !self.config.json_output {
            info!("🧪 Dry run mode: no files will be modified");
        }

        let tracker = ProgressTracker::new(plan.to_convert.len(), plan.stats(), self.config.json_output);
        let (stats, state) = planner.execute(&plan, tracker).await;

        if !self.config.json_output {
            if let Some(encoder) = state.pinned() {
                info!("Encoder used: {}", encoder);
            }
            info!("{}", stats.format_summary());
        }

        Ok(stats)
    }

    async fn plan_with_spinner(&self, planner: &BatchPlanner<'_>) -> BatchPlan {
        if self.config.json_output {
            return planner.plan(&self.input_dir).await;
        }
        let spinner = ProgressManager::spinner(&format!("🔍 Scanning {}", self.input_dir.display()));
        let plan = planner.plan(&self.input_dir).await;
        spinner.finish_and_clear();
        plan
    }

    fn report_plan(&self, plan: &BatchPlan) {
        if self.config.json_output {
            JsonMessage::Start {
                input_dir: self.input_dir.clone(),
                total_files: plan.discovered.len(),
                files_to_convert: plan.to_convert.len(),
                config: JsonConfig::from(&self.config),
            }
            .emit();
            return;
        }

        println!("TOTAL FILES FOUND ({})", plan.discovered.len());
        for path in &plan.discovered {
            println!("  {}", path.display());
        }
        println!("FILES TO PROCESS ({})", plan.to_convert.len());
        for file in &plan.to_convert {
            println!("  {} [{}]", file.path.display(), file.codec().unwrap_or("?"));
        }

        if !plan.already_target.is_empty() {
            match self.config.max_width {
                Some(width) => info!(
                    "Skipping {} file(s) at most {} px wide",
                    plan.already_target.len(),
                    width
                ),
                None => info!(
                    "Skipping {} file(s) already encoded as {}",
                    plan.already_target.len(),
                    self.config.target_codec
                ),
            }
        }
        for (path, reason) in &plan.probe_failures {
            warn!("Excluded {}: {}", path.display(), reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::batch_planner::VideoFile;
    use crate::encoder::{TranscodeOutcome, TranscodeRequest};
    use crate::probe::ProbeResult;
    use async_trait::async_trait;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// Every file is h264 except names starting with "hevc"
    struct NameProber;

    #[async_trait]
    impl MediaProber for NameProber {
        async fn probe(&self, path: &Path) -> Result<ProbeResult, ConvertError> {
            let name = path.file_name().unwrap().to_string_lossy();
            let codec = if name.starts_with("hevc") { "hevc" } else { "h264" };
            Ok(ProbeResult {
                codec: codec.to_string(),
                width: Some(1280),
                height: Some(720),
                video_streams: vec![],
                audio_streams: vec![],
                subtitle_streams: vec![],
            })
        }
    }

    /// Only the software encoder works
    struct SoftwareOnly;

    #[async_trait]
    impl Transcoder for SoftwareOnly {
        async fn transcode(&self, request: &TranscodeRequest<'_>) -> anyhow::Result<TranscodeOutcome> {
            if request.encoder == "libx265" {
                tokio::fs::write(request.output, b"converted").await?;
                Ok(TranscodeOutcome::ok())
            } else {
                Ok(TranscodeOutcome::failed("exit status: 1"))
            }
        }
    }

    fn converter(dir: &TempDir, config: Config) -> MediaConverter {
        let config = Config {
            trust_extensions: true,
            ..config
        };
        MediaConverter::new(dir.path(), config)
            .unwrap()
            .with_backends(Box::new(NameProber), Box::new(SoftwareOnly), Box::new(LocalFileOps))
    }

    #[tokio::test]
    async fn test_confirmed_batch_converts_work_set() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.avi"), b"original").unwrap();
        std::fs::write(dir.path().join("hevc_b.mp4"), b"original").unwrap();

        let stats = converter(&dir, Config::default())
            .run_with_confirm(|| Ok(true))
            .await
            .unwrap();

        assert_eq!(stats.files_discovered, 2);
        assert_eq!(stats.files_already_target, 1);
        assert_eq!(stats.files_published, 1);
        assert_eq!(std::fs::read(dir.path().join("a.avi")).unwrap(), b"converted");
        assert_eq!(std::fs::read(dir.path().join("hevc_b.mp4")).unwrap(), b"original");
    }

    #[tokio::test]
    async fn test_declined_batch_touches_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.avi"), b"original").unwrap();

        let err = converter(&dir, Config::default())
            .run_with_confirm(|| Ok(false))
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<ConvertError>(), Some(ConvertError::Aborted)));
        assert_eq!(std::fs::read(dir.path().join("a.avi")).unwrap(), b"original");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_nothing_to_do_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hevc_a.mkv"), b"original").unwrap();
        let config = Config {
            assume_yes: true,
            ..Default::default()
        };

        let err = converter(&dir, config)
            .run_with_confirm(|| panic!("must not prompt"))
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<ConvertError>(), Some(ConvertError::NothingToProcess)));
    }

    #[test]
    fn test_prompt_writes_question_and_reads_answer() {
        let mut output = Vec::new();
        let answer = prompt(&mut Cursor::new("y\n"), &mut output).unwrap();
        assert!(answer);
        assert_eq!(String::from_utf8(output).unwrap(), "Do you want to continue? [y/N] ");

        let mut output = Vec::new();
        assert!(!prompt(&mut Cursor::new(""), &mut output).unwrap());
    }

    fn plan_with(files: usize) -> BatchPlan {
        BatchPlan {
            to_convert: (0..files)
                .map(|i| VideoFile::new(PathBuf::from(format!("/videos/{}.avi", i))))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_work_set_is_an_error() {
        let config = Config {
            assume_yes: true,
            ..Default::default()
        };
        let result = confirm_gate(&plan_with(0), &config, || panic!("must not prompt"));
        assert!(matches!(result, Err(ConvertError::NothingToProcess)));
    }

    #[test]
    fn test_yes_flag_skips_prompt() {
        let config = Config {
            assume_yes: true,
            ..Default::default()
        };
        assert!(confirm_gate(&plan_with(2), &config, || panic!("must not prompt")).is_ok());
    }

    #[test]
    fn test_dry_run_skips_prompt() {
        let config = Config {
            dry_run: true,
            ..Default::default()
        };
        assert!(confirm_gate(&plan_with(1), &config, || panic!("must not prompt")).is_ok());
    }

    #[test]
    fn test_declined_prompt_aborts() {
        let config = Config::default();
        let result = confirm_gate(&plan_with(1), &config, || Ok(false));
        assert!(matches!(result, Err(ConvertError::Aborted)));
        assert!(confirm_gate(&plan_with(1), &config, || Ok(true)).is_ok());
    }

    #[test]
    fn test_answer_parsing() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn test_rejects_missing_directory() {
        let result = MediaConverter::new(Path::new("/definitely/not/here"), Config::default());
        assert!(result.is_err());
    }
}
