//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file video da convertire.
//!
//! ## Responsabilità:
//! - Discovery (ricorsiva o meno) di file per estensione
//! - Esclusione delle directory di sistema/cestino a qualsiasi profondità
//! - Verifica opzionale del contenuto tramite magic bytes (`ContentSniffer`)
//! - Enumerazione delle estensioni presenti in una directory
//! - Formattazione human-readable delle dimensioni
//!
//! ## Modalità di discovery:
//! - **trust extensions**: accetta i file solo in base all'estensione
//! - **verify**: richiede anche che il contenuto sia riconosciuto come video
//!
//! I file non leggibili dal processo vengono saltati silenziosamente.
//! Tutti gli iteratori sono lazy.
//!
//! ## Esempio:
//! ```rust,ignore
//! let exts = vec!["mp4".to_string(), "mkv".to_string()];
//! for file in FileManager::discover_videos(root, true, &exts, false) {
//!     println!("{} {:?}", file.path.display(), file.content_type);
//! }
//! ```

use crate::config::normalize_extension;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into
pub const EXCLUDED_DIRS: &[&str] = &[
    "$RECYCLE.BIN",
    ".Trash-1000",
    ".Trashes",
    ".Trash",
    "System Volume Information",
    "lost+found",
];

/// A file yielded by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Sniffed type; `None` when extensions were trusted
    pub content_type: Option<ContentType>,
}

/// Manages file discovery
pub struct FileManager;

impl FileManager {
    /// Lazily yield every regular file under `root`, honouring the exclusion list
    pub fn walk_files(root: &Path, recursive: bool) -> impl Iterator<Item = PathBuf> {
        let max_depth = if recursive { usize::MAX } else { 1 };
        let root = root.to_path_buf();

        WalkDir::new(&root)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| !Self::is_excluded_dir(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(DirEntry::into_path)
    }

    /// Lazily yield candidate video files under `root`.
    ///
    /// Unless `trust_extensions` is set, each file's content is sniffed and
    /// only files classified as video are yielded, together with their type.
    pub fn discover_videos(
        root: &Path,
        recursive: bool,
        extensions: &[String],
        trust_extensions: bool,
    ) -> impl Iterator<Item = DiscoveredFile> {
        let accepted: HashSet<String> = extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect();

        Self::walk_files(root, recursive)
            .filter(move |path| Self::has_extension(path, &accepted))
            .filter(|path| Self::is_readable(path))
            .filter_map(move |path| {
                if trust_extensions {
                    return Some(DiscoveredFile {
                        path,
                        content_type: None,
                    });
                }
                let content_type = ContentSniffer::sniff(&path);
                debug!("Sniffed {}: {}", path.display(), content_type);
                content_type.is_video().then_some(DiscoveredFile {
                    path,
                    content_type: Some(content_type),
                })
            })
    }

    /// Lazily yield each distinct (lower-cased) extension under `root`, in first-seen order
    pub fn survey_extensions(root: &Path, recursive: bool) -> impl Iterator<Item = String> {
        let mut seen = HashSet::new();
        Self::walk_files(root, recursive)
            .filter_map(|path| Self::extension_of(&path))
            .filter(move |ext| seen.insert(ext.clone()))
    }

    /// Lower-cased extension of a path, if any
    pub fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    fn has_extension(path: &Path, accepted: &HashSet<String>) -> bool {
        Self::extension_of(path)
            .map(|ext| accepted.contains(&ext))
            .unwrap_or(false)
    }

    fn is_excluded_dir(entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| EXCLUDED_DIRS.iter().any(|dir| *dir == name))
                .unwrap_or(false)
    }

    /// True if the current process can open the file for reading
    pub fn is_readable(path: &Path) -> bool {
        match File::open(path) {
            Ok(_) => true,
            Err(e) => {
                debug!("Skipping unreadable file {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

/// Content type determined from a file's leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Video(&'static str),
    Audio(&'static str),
    Other,
}

impl ContentType {
    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Video(mime) | Self::Audio(mime) => mime,
            Self::Other => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

/// Magic-byte classifier for container formats
pub struct ContentSniffer;

impl ContentSniffer {
    /// MPEG-TS packets are 188 bytes; two sync bytes are required
    const TS_PACKET: usize = 188;
    const HEADER_LEN: usize = Self::TS_PACKET * 2;

    /// ISO-BMFF brands that only ever carry audio
    const AUDIO_BRANDS: &'static [&'static [u8; 4]] = &[b"M4A ", b"M4B ", b"M4P ", b"F4A ", b"F4B "];

    /// Sniff a file on disk. Unreadable files are `Other`.
    pub fn sniff(path: &Path) -> ContentType {
        let mut header = Vec::with_capacity(Self::HEADER_LEN);
        match File::open(path) {
            Ok(file) => {
                if let Err(e) = file.take(Self::HEADER_LEN as u64).read_to_end(&mut header) {
                    debug!("Failed to read header of {}: {}", path.display(), e);
                    return ContentType::Other;
                }
            }
            Err(_) => return ContentType::Other,
        }
        Self::classify(&header)
    }

    /// Classify raw leading bytes
    pub fn classify(header: &[u8]) -> ContentType {
        if header.len() >= 12 && &header[4..8] == b"ftyp" {
            let brand = &header[8..12];
            if Self::AUDIO_BRANDS.iter().any(|b| &b[..] == brand) {
                return ContentType::Audio("audio/mp4");
            }
            if brand.starts_with(b"qt") {
                return ContentType::Video("video/quicktime");
            }
            if brand.starts_with(b"3g") {
                return ContentType::Video("video/3gpp");
            }
            return ContentType::Video("video/mp4");
        }
        if header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return if Self::contains(header, b"webm") {
                ContentType::Video("video/webm")
            } else {
                ContentType::Video("video/x-matroska")
            };
        }
        if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"AVI " {
            return ContentType::Video("video/x-msvideo");
        }
        if header.len() > Self::TS_PACKET && header[0] == 0x47 && header[Self::TS_PACKET] == 0x47 {
            return ContentType::Video("video/mp2t");
        }
        if header.starts_with(&[0x00, 0x00, 0x01, 0xBA]) || header.starts_with(&[0x00, 0x00, 0x01, 0xB3]) {
            return ContentType::Video("video/mpeg");
        }
        if header.starts_with(b"FLV") {
            return ContentType::Video("video/x-flv");
        }
        if header.starts_with(&[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11]) {
            return ContentType::Video("video/x-ms-asf");
        }
        if header.starts_with(b"OggS") {
            return if Self::contains(header, b"theora") {
                ContentType::Video("video/ogg")
            } else {
                ContentType::Audio("audio/ogg")
            };
        }
        ContentType::Other
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }
}
