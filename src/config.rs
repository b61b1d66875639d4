//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della conversione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `extensions`: Estensioni da considerare (default: mp4, m4a, mkv, ts, avi)
//! - `all_extensions`: Usa tutte le estensioni trovate nella directory
//! - `recursive`: Scansione ricorsiva delle sottodirectory
//! - `trust_extensions`: Salta la verifica del contenuto dei file
//! - `target_codec`: Codec di destinazione (default: hevc)
//! - `destructive`: Sostituisce i file originali (default: true)
//! - `dry_run`: Simula senza modificare nulla
//! - `assume_yes`: Salta la conferma interattiva
//! - `forced_encoder`: Usa un solo encoder invece della lista di fallback
//! - `fallback_policy`: Comportamento dopo un fallimento dell'encoder fissato
//! - `json_output`: Eventi JSON su stdout invece della progress bar
//! - `max_width`: Modalità riduzione risoluzione: ricodifica solo i video più
//!   larghi di questo valore, scrivendo una copia `<nome> - 1080p.mp4`
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     recursive: true,
//!     destructive: false,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::encoder::{CodecFamily, FallbackPolicy};
use crate::error::ConvertError;
use crate::utils::to_string_vec;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_EXTENSIONS: &[&str] = &["mp4", "m4a", "mkv", "ts", "avi"];

/// Configuration for a conversion batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extensions to consider, without leading dot
    pub extensions: Vec<String>,
    /// Survey the directory and accept every extension found
    pub all_extensions: bool,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Accept files by extension only, without sniffing their content
    pub trust_extensions: bool,
    /// Target codec family
    pub target_codec: CodecFamily,
    /// Replace originals in place (false = write a sibling file)
    pub destructive: bool,
    /// Dry run - report actions without touching anything
    pub dry_run: bool,
    /// Do not ask for confirmation before converting
    pub assume_yes: bool,
    /// Single encoder backend to use instead of the family's candidate list
    pub forced_encoder: Option<String>,
    /// What to do when the pinned encoder fails on a later file
    pub fallback_policy: FallbackPolicy,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    /// Downscale mode: only videos wider than this are processed
    pub max_width: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: to_string_vec(DEFAULT_EXTENSIONS),
            all_extensions: false,
            recursive: false,
            trust_extensions: false,
            target_codec: CodecFamily::default(),
            destructive: true,
            dry_run: false,
            assume_yes: false,
            forced_encoder: None,
            fallback_policy: FallbackPolicy::default(),
            json_output: false,
            max_width: None,
        }
    }
}

impl Config {
    /// Parse a comma separated extension list, e.g. "mp4,.MKV, avi"
    pub fn parse_extensions(list: &str) -> Vec<String> {
        list.split(',')
            .map(normalize_extension)
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.all_extensions && self.extensions.iter().all(|e| normalize_extension(e).is_empty()) {
            return Err(ConvertError::Validation(
                "At least one file extension is required (or use all extensions mode)".to_string(),
            )
            .into());
        }

        if let Some(ref encoder) = self.forced_encoder {
            if encoder.trim().is_empty() || encoder.chars().any(char::is_whitespace) {
                return Err(ConvertError::Validation(format!(
                    "Invalid encoder name: {:?}",
                    encoder
                ))
                .into());
            }
        }

        if let Some(width) = self.max_width {
            if width < 2 || width % 2 != 0 {
                return Err(ConvertError::Validation(format!(
                    "Maximum width must be an even number of pixels, got {}",
                    width
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Lower-case an extension and strip surrounding whitespace and a leading dot
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}
