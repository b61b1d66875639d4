//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche della conversione.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Spinner per la fase di discovery e probing
//! - Tracking statistiche (file trovati, convertiti, saltati, errori)
//! - Report finale con variazione di dimensione complessiva
//!
//! ## Statistiche tracciate:
//! - **files_discovered**: File video trovati dalla discovery
//! - **files_already_target**: File già nel codec di destinazione (saltati)
//! - **probe_failures**: File che ffprobe non è riuscito ad analizzare
//! - **files_to_convert**: File che richiedono conversione
//! - **files_published**: Conversioni completate e pubblicate
//! - **files_planned**: File simulati in dry-run
//! - **errors**: Conversioni fallite
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:12:15] [========================================] 12/12 (100%) ✅ movie.avi -> movie.avi (libx265)
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for a conversion batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A manager that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Set a custom message without incrementing
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Print a line above the bar
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

/// Statistics for one batch
#[derive(Debug, Default, Clone, Serialize)]
pub struct ConversionStats {
    pub files_discovered: usize,
    pub files_already_target: usize,
    pub probe_failures: usize,
    pub files_to_convert: usize,
    pub files_published: usize,
    pub files_planned: usize,
    pub errors: usize,
    pub total_original_size: u64,
    pub total_converted_size: u64,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_published(&mut self, original_size: u64, converted_size: u64) {
        self.files_published += 1;
        self.total_original_size += original_size;
        self.total_converted_size += converted_size;
    }

    pub fn add_planned(&mut self) {
        self.files_planned += 1;
    }

    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Size change of the published files, negative when they shrank
    pub fn size_change_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_converted_size as f64 - self.total_original_size as f64) / self.total_original_size as f64
                * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        if self.files_planned > 0 {
            return format!(
                "Dry run: {} of {} files would be converted | Already target codec: {} | Probe failures: {}",
                self.files_planned, self.files_discovered, self.files_already_target, self.probe_failures
            );
        }
        format!(
            "Converted: {}/{} | Errors: {} | Skipped: {} | Probe failures: {} | Size: {} -> {} ({:+.2}%)",
            self.files_published,
            self.files_to_convert,
            self.errors,
            self.files_already_target,
            self.probe_failures,
            FileManager::format_size(self.total_original_size),
            FileManager::format_size(self.total_converted_size),
            self.size_change_percent()
        )
    }
}
