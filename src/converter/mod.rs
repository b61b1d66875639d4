//! # Converter Module
//!
//! Separa le responsabilità della conversione in sottomoduli:
//! - `media_converter`: Orchestratore principale e conferma utente
//! - `batch_planner`: Discovery + probing e loop sequenziale del batch
//! - `conversion_task`: Transazione di conversione per singolo file
//! - `progress_tracker`: Progress bar / eventi JSON
//! - `path_resolver`: Piano di pubblicazione e path temporanei

pub mod batch_planner;
pub mod conversion_task;
pub mod media_converter;
pub mod path_resolver;
pub mod progress_tracker;

pub use batch_planner::{BatchPlan, BatchPlanner, VideoFile};
pub use conversion_task::{ConversionJob, ConversionTransaction, DryRunReport, PublishedFile};
pub use media_converter::{confirm_gate, MediaConverter};
pub use path_resolver::{PathResolver, PublishPlan};
pub use progress_tracker::ProgressTracker;
