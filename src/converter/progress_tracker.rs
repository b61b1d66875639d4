//! # Progress Tracking Module
//!
//! Unifica progress bar ed eventi JSON in un singolo tracker.
//! Il batch è sequenziale, quindi il tracker è posseduto dal loop e non
//! richiede sincronizzazione.

use crate::converter::conversion_task::{DryRunReport, PublishedFile};
use crate::error::ConvertError;
use crate::json_output::JsonMessage;
use crate::progress::{ConversionStats, ProgressManager};
use std::path::Path;

enum Output {
    Bar(ProgressManager),
    Json,
}

/// Tracker progress unificato
pub struct ProgressTracker {
    total_files: usize,
    current_file: usize,
    stats: ConversionStats,
    output: Output,
}

impl ProgressTracker {
    /// Crea un nuovo tracker con progress bar (o eventi JSON)
    pub fn new(total_files: usize, stats: ConversionStats, json_output: bool) -> Self {
        let output = if json_output {
            Output::Json
        } else {
            Output::Bar(ProgressManager::new(total_files as u64))
        };
        Self {
            total_files,
            current_file: 0,
            stats,
            output,
        }
    }

    /// Tracker che non disegna nulla (test, pipeline non interattive)
    pub fn hidden(total_files: usize, stats: ConversionStats) -> Self {
        Self {
            total_files,
            current_file: 0,
            stats,
            output: Output::Bar(ProgressManager::hidden()),
        }
    }

    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    /// Segnala l'inizio di un file
    pub fn file_started(&mut self, path: &Path) {
        self.current_file += 1;
        match &self.output {
            Output::Json => JsonMessage::FileStart {
                path: path.to_path_buf(),
                index: self.current_file,
                total: self.total_files,
            }
            .emit(),
            Output::Bar(bar) => bar.set_message(&format!("🎬 {}", file_name(path))),
        }
    }

    /// File convertito e pubblicato
    pub fn file_published(&mut self, published: &PublishedFile, original_size: u64, converted_size: u64) {
        self.stats.add_published(original_size, converted_size);
        match &self.output {
            Output::Json => JsonMessage::FileComplete {
                path: published.source.clone(),
                destination: Some(published.destination.clone()),
                encoder: Some(published.encoder.clone()),
                original_size,
                converted_size,
                error: None,
            }
            .emit(),
            Output::Bar(bar) => bar.update(&format!(
                "✅ {} -> {} ({})",
                file_name(&published.source),
                file_name(&published.destination),
                published.encoder
            )),
        }
    }

    /// Conversione fallita: il file sorgente è intatto
    pub fn file_failed(&mut self, path: &Path, error: &ConvertError) {
        self.stats.add_error();
        match &self.output {
            Output::Json => JsonMessage::FileComplete {
                path: path.to_path_buf(),
                destination: None,
                encoder: None,
                original_size: 0,
                converted_size: 0,
                error: Some(error.to_string()),
            }
            .emit(),
            Output::Bar(bar) => bar.update(&format!("❌ {}: {}", file_name(path), error)),
        }
    }

    /// Azioni previste in dry-run
    pub fn file_planned(&mut self, report: &DryRunReport) {
        self.stats.add_planned();
        match &self.output {
            Output::Json => JsonMessage::DryRun {
                path: report.source.clone(),
                destination: report.destination.clone(),
                plan: report.plan,
                commands: report.commands.clone(),
                actions: report.actions.clone(),
            }
            .emit(),
            Output::Bar(bar) => {
                bar.println(&format!("# {} ({})", report.source.display(), report.plan));
                for command in &report.commands {
                    bar.println(command);
                }
                for action in &report.actions {
                    bar.println(&format!("  {}", action));
                }
                bar.update(&format!("🧪 {}", file_name(&report.source)));
            }
        }
    }

    /// Finalizza e restituisce le statistiche
    pub fn finish(self, pinned_encoder: Option<&str>, duration_seconds: f64) -> ConversionStats {
        match &self.output {
            Output::Json => JsonMessage::Complete {
                stats: self.stats.clone(),
                pinned_encoder: pinned_encoder.map(str::to_string),
                duration_seconds,
            }
            .emit(),
            Output::Bar(bar) => bar.finish(&self.stats.format_summary()),
        }
        self.stats
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().to_string()
}
