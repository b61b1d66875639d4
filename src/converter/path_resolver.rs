//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di output.
//! Usata sia dalla conversione reale che dal dry-run, così i due producono
//! sempre gli stessi nomi di file.

use crate::encoder::CodecFamily;
use crate::error::ConvertError;
use crate::file_manager::FileManager;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// How a finished temp file becomes the user-visible result
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishPlan {
    /// Delete the source, move the temp file to the source path
    OverwriteInPlace,
    /// Source already uses the target container: `<stem>_<codec>.<container>`
    SiblingWithSuffix,
    /// Source uses another container: `<stem>.<container>`
    NewExtension,
    /// Reduced-resolution copy: `<stem> - <label>p.<container>`, source kept
    Downscaled { width: u32 },
}

impl PublishPlan {
    pub fn decide(source: &Path, destructive: bool, family: CodecFamily) -> Self {
        if destructive {
            return Self::OverwriteInPlace;
        }
        let same_container = FileManager::extension_of(source)
            .map(|ext| ext == family.container())
            .unwrap_or(false);
        if same_container {
            Self::SiblingWithSuffix
        } else {
            Self::NewExtension
        }
    }

    /// The source file survives publishing
    pub fn keeps_source(&self) -> bool {
        !matches!(self, Self::OverwriteInPlace)
    }
}

impl std::fmt::Display for PublishPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::OverwriteInPlace => "overwrite in place",
            Self::SiblingWithSuffix => "sibling with codec suffix",
            Self::NewExtension => "sibling with new extension",
            Self::Downscaled { width } => return write!(f, "downscaled sibling ({} px wide)", width),
        };
        f.write_str(label)
    }
}

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Final path of the converted file
    pub fn final_path(source: &Path, plan: PublishPlan, family: CodecFamily) -> Result<PathBuf, ConvertError> {
        if plan == PublishPlan::OverwriteInPlace {
            return Ok(source.to_path_buf());
        }

        let stem = source
            .file_stem()
            .ok_or_else(|| ConvertError::Validation(format!("Invalid file name: {}", source.display())))?;

        let mut filename = match (plan, stem.to_str()) {
            (PublishPlan::Downscaled { .. }, Some(name)) => OsString::from(strip_resolution_tag(name)),
            _ => OsString::from(stem),
        };
        match plan {
            PublishPlan::SiblingWithSuffix => {
                filename.push(format!("_{}.{}", family.codec_name(), family.container()));
            }
            PublishPlan::Downscaled { width } => {
                filename.push(format!(" - {}p.{}", resolution_label(width), family.container()));
            }
            _ => {
                filename.push(format!(".{}", family.container()));
            }
        }

        Ok(source.with_file_name(filename))
    }

    /// Directory the temp file is created in: always the source's own directory
    pub fn temp_dir(source: &Path) -> &Path {
        match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Hidden prefix for the per-job temp file, e.g. `.movie.`
    pub fn temp_prefix(source: &Path) -> OsString {
        let mut prefix = OsString::from(".");
        if let Some(stem) = source.file_stem() {
            prefix.push(stem);
        }
        prefix.push(".");
        prefix
    }

    /// Temp suffix; keeps the container extension so ffmpeg picks the right muxer
    pub fn temp_suffix(family: CodecFamily) -> String {
        format!(".transcode.{}", family.container())
    }

    /// What a temp path looks like, for dry-run reports
    pub fn temp_preview(source: &Path, family: CodecFamily) -> PathBuf {
        let mut name = Self::temp_prefix(source);
        name.push("XXXXXX");
        name.push(Self::temp_suffix(family));
        Self::temp_dir(source).join(name)
    }
}

/// Nominal "NNNNp" label for a 16:9 frame of the given width (1920 -> 1080)
pub fn resolution_label(width: u32) -> u32 {
    width * 9 / 16
}

/// Cut a stem at its first ` - NNNNp` tag, e.g. `Movie - 2160p HDR` -> `Movie`
fn strip_resolution_tag(stem: &str) -> &str {
    let mut search = 0;
    while let Some(found) = stem[search..].find(" - ") {
        let at = search + found;
        let rest = &stem[at + 3..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 && rest.as_bytes().get(digits) == Some(&b'p') {
            return &stem[..at];
        }
        search = at + 1;
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(source: &str, destructive: bool) -> (PublishPlan, PathBuf) {
        let source = Path::new(source);
        let plan = PublishPlan::decide(source, destructive, CodecFamily::Hevc);
        (plan, PathResolver::final_path(source, plan, CodecFamily::Hevc).unwrap())
    }

    #[test]
    fn test_naming_matrix() {
        assert_eq!(
            resolve("/videos/movie.avi", true),
            (PublishPlan::OverwriteInPlace, PathBuf::from("/videos/movie.avi"))
        );
        assert_eq!(
            resolve("/videos/movie.mp4", false),
            (PublishPlan::SiblingWithSuffix, PathBuf::from("/videos/movie_hevc.mp4"))
        );
        assert_eq!(
            resolve("/videos/movie.avi", false),
            (PublishPlan::NewExtension, PathBuf::from("/videos/movie.mp4"))
        );
    }

    #[test]
    fn test_container_match_is_case_insensitive() {
        assert_eq!(
            resolve("/videos/Holiday.MP4", false),
            (PublishPlan::SiblingWithSuffix, PathBuf::from("/videos/Holiday_hevc.mp4"))
        );
    }

    #[test]
    fn test_only_last_extension_is_replaced() {
        assert_eq!(
            resolve("/videos/show.s01e01.mkv", false).1,
            PathBuf::from("/videos/show.s01e01.mp4")
        );
    }

    #[test]
    fn test_other_families_use_their_codec_suffix() {
        let source = Path::new("clip.mp4");
        let plan = PublishPlan::decide(source, false, CodecFamily::Av1);
        assert_eq!(
            PathResolver::final_path(source, plan, CodecFamily::Av1).unwrap(),
            PathBuf::from("clip_av1.mp4")
        );
    }

    #[test]
    fn test_downscaled_name_replaces_resolution_tag() {
        let plan = PublishPlan::Downscaled { width: 1920 };
        assert!(plan.keeps_source());

        let name = |source: &str| PathResolver::final_path(Path::new(source), plan, CodecFamily::Hevc).unwrap();
        assert_eq!(name("/videos/Movie.mkv"), PathBuf::from("/videos/Movie - 1080p.mp4"));
        assert_eq!(name("/videos/Movie - 2160p.mkv"), PathBuf::from("/videos/Movie - 1080p.mp4"));
        assert_eq!(name("/videos/Movie - 2160p HDR.mp4"), PathBuf::from("/videos/Movie - 1080p.mp4"));
        assert_eq!(name("/videos/Show - 1x02.mkv"), PathBuf::from("/videos/Show - 1x02 - 1080p.mp4"));
    }

    #[test]
    fn test_resolution_label() {
        assert_eq!(resolution_label(1920), 1080);
        assert_eq!(resolution_label(1280), 720);
        assert_eq!(resolution_label(3840), 2160);
    }

    #[test]
    fn test_temp_lives_next_to_source() {
        assert_eq!(PathResolver::temp_dir(Path::new("/videos/a.avi")), Path::new("/videos"));
        assert_eq!(PathResolver::temp_dir(Path::new("a.avi")), Path::new("."));
        assert_eq!(
            PathResolver::temp_preview(Path::new("/videos/a.avi"), CodecFamily::Hevc),
            PathBuf::from("/videos/.a.XXXXXX.transcode.mp4")
        );
    }
}
