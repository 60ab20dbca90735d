//! On-disk layout for one work item's artifacts.
//!
//! ```text
//! <work item dir>/
//!   downloaded_videos/<title>
//!   audio_extractions/<stem>.<ext>
//!   audio_extractions/<stem>_part000.<ext>
//!   transcripts/<stem>.txt
//!   summaries/<stem>.summary.md
//! ```
//!
//! Files are written to `<path>.part` and renamed into place, so an existing
//! final path always holds a complete artifact.

mod artifact;

pub use artifact::{
    sanitize_file_name, ArtifactKey, ArtifactKind, LocalArtifact, TranscriptionUnit,
};

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const VIDEO_DIR: &str = "downloaded_videos";
pub const AUDIO_DIR: &str = "audio_extractions";
pub const TRANSCRIPT_DIR: &str = "transcripts";
pub const SUMMARY_DIR: &str = "summaries";

const LOCK_FILE: &str = ".lock";
const PARTIAL_EXTENSION: &str = "part";
const CHUNK_INFIX: &str = "_part";
const CHUNK_ORDINAL_WIDTH: usize = 3;

pub struct MediaStore {
    root: PathBuf,
    audio_extension: String,
    _lock: WorkItemLock,
}

impl MediaStore {
    /// Create the layout under `root` and take the work item's writer lock.
    ///
    /// Fails immediately if another process holds the lock.
    pub fn open(root: impl Into<PathBuf>, audio_extension: &str) -> Result<Self> {
        let root = root.into();
        for dir in [VIDEO_DIR, AUDIO_DIR, TRANSCRIPT_DIR, SUMMARY_DIR] {
            std::fs::create_dir_all(root.join(dir))
                .with_context(|| format!("Failed to create {}", root.join(dir).display()))?;
        }
        let lock = WorkItemLock::acquire(&root.join(LOCK_FILE))?;
        debug!("Opened media store at {}", root.display());

        Ok(Self {
            root,
            audio_extension: audio_extension.to_string(),
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video(&self, title: &str) -> LocalArtifact {
        LocalArtifact::new(
            ArtifactKey::from_title(title),
            ArtifactKind::Video,
            self.root.join(VIDEO_DIR).join(sanitize_file_name(title)),
        )
    }

    pub fn audio(&self, key: &ArtifactKey) -> LocalArtifact {
        let path = self
            .root
            .join(AUDIO_DIR)
            .join(format!("{}.{}", key, self.audio_extension));
        LocalArtifact::new(key.clone(), ArtifactKind::Audio, path)
    }

    pub fn chunk(&self, key: &ArtifactKey, ordinal: u32) -> LocalArtifact {
        let path = self.root.join(AUDIO_DIR).join(format!(
            "{}{}{:0width$}.{}",
            key,
            CHUNK_INFIX,
            ordinal,
            self.audio_extension,
            width = CHUNK_ORDINAL_WIDTH
        ));
        LocalArtifact::chunk(key.clone(), ordinal, path)
    }

    /// Output pattern for ffmpeg's segment muxer, e.g. `foo_part%03d.mp3`.
    pub fn chunk_pattern(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(AUDIO_DIR).join(format!(
            "{}{}%0{}d.{}",
            key, CHUNK_INFIX, CHUNK_ORDINAL_WIDTH, self.audio_extension
        ))
    }

    /// Existing chunks for `key`, sorted by ordinal rather than listing order.
    pub fn chunks(&self, key: &ArtifactKey) -> Result<Vec<LocalArtifact>> {
        let dir = self.root.join(AUDIO_DIR);
        let prefix = format!("{}{}", key, CHUNK_INFIX);
        let suffix = format!(".{}", self.audio_extension);

        let mut chunks = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let ordinal = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse::<u32>().ok());
            if let Some(ordinal) = ordinal {
                chunks.push(LocalArtifact::chunk(key.clone(), ordinal, entry.path()));
            }
        }
        chunks.sort_by_key(|chunk| chunk.ordinal);
        Ok(chunks)
    }

    pub fn remove_chunks(&self, key: &ArtifactKey) -> Result<usize> {
        let chunks = self.chunks(key)?;
        for chunk in &chunks {
            std::fs::remove_file(&chunk.path)
                .with_context(|| format!("Failed to remove {}", chunk.path.display()))?;
        }
        Ok(chunks.len())
    }

    pub fn transcript(&self, key: &ArtifactKey) -> LocalArtifact {
        let path = self.root.join(TRANSCRIPT_DIR).join(format!("{}.txt", key));
        LocalArtifact::new(key.clone(), ArtifactKind::Transcript, path)
    }

    pub fn summary(&self, key: &ArtifactKey) -> LocalArtifact {
        let path = self
            .root
            .join(SUMMARY_DIR)
            .join(format!("{}.summary.md", key));
        LocalArtifact::new(key.clone(), ArtifactKind::Summary, path)
    }

    /// Write `contents` to a sibling temp file and rename it over `path`.
    pub fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let partial = partial_path(path);
        std::fs::write(&partial, contents)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        std::fs::rename(&partial, path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    }
}

/// The stem whose chunk names `key` occupies, if `key` has the form `<stem>_part<digits>`.
///
/// Such a key's whole-audio path is the same file as a chunk of `<stem>`.
pub fn chunk_parent(key: &ArtifactKey) -> Option<&str> {
    let (stem, ordinal) = key.as_str().rsplit_once(CHUNK_INFIX)?;
    let is_ordinal = !ordinal.is_empty() && ordinal.bytes().all(|b| b.is_ascii_digit());
    (is_ordinal && !stem.is_empty()).then_some(stem)
}

/// Sibling path used while an artifact is still being written.
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_EXTENSION);
    path.with_file_name(name)
}

/// Remove a leftover temp file from an interrupted write. Returns whether one existed.
pub fn discard_partial(path: &Path) -> Result<bool> {
    let partial = partial_path(path);
    if !partial.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&partial)
        .with_context(|| format!("Failed to remove partial file {}", partial.display()))?;
    Ok(true)
}

pub fn file_size(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;
    Ok(metadata.len())
}

struct WorkItemLock {
    file: File,
}

impl WorkItemLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;
        file.try_lock_exclusive().map_err(|_| {
            anyhow!(
                "Another run is already processing {}",
                path.parent().unwrap_or(path).display()
            )
        })?;
        Ok(Self { file })
    }
}

impl Drop for WorkItemLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            debug!("Failed to release work item lock: {err:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> MediaStore {
        MediaStore::open(dir.path().join("page"), "mp3").unwrap()
    }

    #[test]
    fn test_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        for sub in [VIDEO_DIR, AUDIO_DIR, TRANSCRIPT_DIR, SUMMARY_DIR] {
            assert!(store.root().join(sub).is_dir(), "{sub} missing");
        }
    }

    #[test]
    fn test_second_open_is_rejected_while_locked() {
        let dir = TempDir::new().unwrap();
        let _store = open_store(&dir);

        let second = MediaStore::open(dir.path().join("page"), "mp3");
        assert!(second.is_err());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        drop(open_store(&dir));
        assert!(MediaStore::open(dir.path().join("page"), "mp3").is_ok());
    }

    #[test]
    fn test_paths_derive_from_stem() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let video = store.video("Standup.mov");

        assert_eq!(video.key.as_str(), "Standup");
        assert!(video.path.ends_with("downloaded_videos/Standup.mov"));
        assert!(store
            .audio(&video.key)
            .path
            .ends_with("audio_extractions/Standup.mp3"));
        assert!(store
            .chunk(&video.key, 7)
            .path
            .ends_with("audio_extractions/Standup_part007.mp3"));
        assert!(store
            .chunk_pattern(&video.key)
            .ends_with("audio_extractions/Standup_part%03d.mp3"));
        assert!(store
            .transcript(&video.key)
            .path
            .ends_with("transcripts/Standup.txt"));
        assert!(store
            .summary(&video.key)
            .path
            .ends_with("summaries/Standup.summary.md"));
    }

    #[test]
    fn test_chunks_sorted_by_ordinal() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let key = ArtifactKey::from_title("talk.mp4");
        let audio_dir = store.root().join(AUDIO_DIR);

        for name in [
            "talk_part002.mp3",
            "talk_part000.mp3",
            "talk_part010.mp3",
            "talk_part001.mp3",
            "talk_partial.mp3",
            "talk.mp3",
            "talk_part003.wav",
            "other_part000.mp3",
        ] {
            std::fs::write(audio_dir.join(name), b"x").unwrap();
        }

        let ordinals: Vec<u32> = store
            .chunks(&key)
            .unwrap()
            .iter()
            .map(|c| c.ordinal.unwrap())
            .collect();
        assert_eq!(ordinals, vec![0, 1, 2, 10]);
    }

    #[test]
    fn test_remove_chunks_leaves_parent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let key = ArtifactKey::from_title("talk.mp4");
        std::fs::write(store.audio(&key).path, b"whole").unwrap();
        std::fs::write(store.chunk(&key, 0).path, b"a").unwrap();
        std::fs::write(store.chunk(&key, 1).path, b"b").unwrap();

        assert_eq!(store.remove_chunks(&key).unwrap(), 2);
        assert!(store.chunks(&key).unwrap().is_empty());
        assert!(store.audio(&key).path.exists());
    }

    #[test]
    fn test_write_atomic_leaves_no_partial() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let key = ArtifactKey::from_title("a.mp4");
        let target = store.transcript(&key).path;

        store.write_atomic(&target, b"hello").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
        assert!(!partial_path(&target).exists());
    }

    #[test]
    fn test_chunk_parent() {
        let parent = |title: &str| chunk_parent(&ArtifactKey::from_title(title)).map(str::to_string);

        assert_eq!(parent("talk_part000.mp4").as_deref(), Some("talk"));
        assert_eq!(parent("a_part_b_part12.mov").as_deref(), Some("a_part_b"));
        assert_eq!(parent("talk.mp4"), None);
        assert_eq!(parent("talk_partial.mp4"), None);
        assert_eq!(parent("talk_part.mp4"), None);
        assert_eq!(parent("_part001.mp4"), None);
    }

    #[test]
    fn test_discard_partial() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("clip.mp4");
        std::fs::write(partial_path(&target), b"trunc").unwrap();

        assert_eq!(partial_path(&target), dir.path().join("clip.mp4.part"));
        assert!(discard_partial(&target).unwrap());
        assert!(!discard_partial(&target).unwrap());
    }
}
