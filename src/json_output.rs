//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (una riga per evento)
//! per l'uso da script o da altri processi.
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio conversione, con totali e configurazione
//! - `file_start`: Inizio elaborazione di un file
//! - `dry_run`: Azioni che verrebbero eseguite per un file
//! - `file_complete`: Fine elaborazione di un file (pubblicato o fallito)
//! - `complete`: Fine processo con statistiche finali
//! - `error`: Errore generale

use crate::config::Config;
use crate::converter::path_resolver::PublishPlan;
use crate::encoder::{CodecFamily, FallbackPolicy};
use crate::progress::ConversionStats;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del processo di conversione
    Start {
        input_dir: PathBuf,
        total_files: usize,
        files_to_convert: usize,
        config: JsonConfig,
    },

    /// Inizio elaborazione di un file specifico
    FileStart {
        path: PathBuf,
        index: usize,
        total: usize,
    },

    /// Azioni previste in dry-run
    DryRun {
        path: PathBuf,
        destination: PathBuf,
        plan: PublishPlan,
        commands: Vec<String>,
        actions: Vec<String>,
    },

    /// Fine elaborazione di un file specifico
    FileComplete {
        path: PathBuf,
        destination: Option<PathBuf>,
        encoder: Option<String>,
        original_size: u64,
        converted_size: u64,
        error: Option<String>,
    },

    /// Processo completato
    Complete {
        #[serde(flatten)]
        stats: ConversionStats,
        pinned_encoder: Option<String>,
        duration_seconds: f64,
    },

    /// Errore generale
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub target_codec: CodecFamily,
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub trust_extensions: bool,
    pub destructive: bool,
    pub dry_run: bool,
    pub fallback_policy: FallbackPolicy,
    pub max_width: Option<u32>,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            details,
        }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            target_codec: config.target_codec,
            extensions: config.extensions.clone(),
            recursive: config.recursive,
            trust_extensions: config.trust_extensions,
            destructive: config.destructive,
            dry_run: config.dry_run,
            fallback_policy: config.fallback_policy,
            max_width: config.max_width,
        }
    }
}
