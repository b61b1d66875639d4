//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` enum per categorizzare gli errori della pipeline
//! - Distingue gli errori per singolo file (il batch continua) da quelli fatali
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Probe`: ffprobe fallito o output non interpretabile (file escluso)
//! - `EncoderExhausted`: nessun encoder candidato ha funzionato per il file
//! - `Transcode`: l'encoder già fissato per il batch ha fallito
//! - `DestinationExists`: il file di destinazione non distruttivo esiste già
//! - `NothingToProcess` / `Aborted`: unici errori fatali per il batch
//!
//! I file non leggibili durante la discovery non generano errori: vengono
//! semplicemente saltati.

use std::path::PathBuf;

/// Custom error types for batch conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("No encoder succeeded for {path} (tried: {})", .tried.join(", "))]
    EncoderExhausted { path: PathBuf, tried: Vec<String> },

    #[error("Transcode of {path} with {encoder} failed: {status}")]
    Transcode {
        path: PathBuf,
        encoder: String,
        status: String,
    },

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Unknown target codec: {0}")]
    UnknownCodec(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Configuration error: {0}")]
    Validation(String),

    #[error("No files need conversion")]
    NothingToProcess,

    #[error("Aborted by user")]
    Aborted,
}

impl ConvertError {
    pub fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
