//! # Video Batch Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `file_manager`: Discovery dei file video e survey delle estensioni
//! - `probe`: Analisi degli stream tramite ffprobe
//! - `encoder`: Famiglie di codec, lista encoder e pinning
//! - `video_processor`: Invocazione di ffmpeg
//! - `file_ops`: Permessi, timestamp, rename e delete dietro un trait
//! - `converter`: Pianificazione batch e transazioni di conversione
//! - `progress` / `json_output`: Feedback utente
//! - `platform`: Risoluzione dei comandi esterni
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use video_batch_converter::{Config, MediaConverter};
//!
//! let config = Config { recursive: true, ..Default::default() };
//! let converter = MediaConverter::new(&path, config)?;
//! converter.run().await?;
//! ```

pub mod config;
pub mod converter;
pub mod encoder;
pub mod error;
pub mod file_manager;
pub mod file_ops;
pub mod json_output;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod utils;
pub mod video_processor;

pub use config::Config;
pub use converter::{BatchPlanner, ConversionTransaction, MediaConverter};
pub use encoder::{BatchState, CodecFamily, EncoderSelector, FallbackPolicy};
pub use error::ConvertError;
