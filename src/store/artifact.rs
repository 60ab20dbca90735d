//! Typed identity for everything the pipeline writes to disk.

use std::fmt;
use std::path::PathBuf;

const ILLEGAL_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters that cannot appear in a file name on common platforms.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if ILLEGAL_FILE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "untitled".to_string()
    } else {
        cleaned
    }
}

/// Stem shared by every artifact derived from one attachment.
///
/// Derived once from the attachment title and carried alongside each artifact,
/// so later stages never re-parse file names to find their inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Sanitized title with its last extension removed.
    pub fn from_title(title: &str) -> Self {
        let file_name = sanitize_file_name(title);
        let stem = match file_name.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
            _ => file_name,
        };
        Self(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Video,
    Audio,
    AudioChunk,
    Transcript,
    Summary,
}

/// One stage output for one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    pub key: ArtifactKey,
    pub kind: ArtifactKind,
    /// Playback position for chunks, `None` otherwise.
    pub ordinal: Option<u32>,
    pub path: PathBuf,
}

impl LocalArtifact {
    pub fn new(key: ArtifactKey, kind: ArtifactKind, path: PathBuf) -> Self {
        Self {
            key,
            kind,
            ordinal: None,
            path,
        }
    }

    pub fn chunk(key: ArtifactKey, ordinal: u32, path: PathBuf) -> Self {
        Self {
            key,
            kind: ArtifactKind::AudioChunk,
            ordinal: Some(ordinal),
            path,
        }
    }
}

/// Audio for one parent, either whole or split into ordered segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionUnit {
    Whole(LocalArtifact),
    Chunked {
        key: ArtifactKey,
        chunks: Vec<LocalArtifact>,
    },
}

impl TranscriptionUnit {
    pub fn key(&self) -> &ArtifactKey {
        match self {
            Self::Whole(artifact) => &artifact.key,
            Self::Chunked { key, .. } => key,
        }
    }

    /// Files to transcribe, in playback order.
    pub fn audio_files(&self) -> Vec<&LocalArtifact> {
        match self {
            Self::Whole(artifact) => vec![artifact],
            Self::Chunked { chunks, .. } => chunks.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_strips_last_extension_only() {
        assert_eq!(ArtifactKey::from_title("demo.MP4").as_str(), "demo");
        assert_eq!(
            ArtifactKey::from_title("sprint.review.mov").as_str(),
            "sprint.review"
        );
        assert_eq!(ArtifactKey::from_title("no_extension").as_str(), "no_extension");
    }

    #[test]
    fn test_key_sanitizes_recording_titles() {
        let key = ArtifactKey::from_title("Weekly Sync_2024-03-01T10:00:00Z.mp4");
        assert_eq!(key.as_str(), "Weekly Sync_2024-03-01T10_00_00Z");
    }

    #[test]
    fn test_sanitize_rejects_path_traversal() {
        assert_eq!(sanitize_file_name("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_file_name(".."), "untitled");
        assert_eq!(sanitize_file_name("   "), "untitled");
    }

    #[test]
    fn test_dotfile_title_keeps_name() {
        assert_eq!(ArtifactKey::from_title(".hidden").as_str(), ".hidden");
    }
}
