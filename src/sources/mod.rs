//! Where recorded meetings come from: wiki page attachments and cloud recordings.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::store::sanitize_file_name;

pub mod confluence;
pub mod zoom;

pub use confluence::ConfluenceClient;
pub use zoom::ZoomClient;

/// Extensions accepted for wiki attachments, compared case-insensitively.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv"];

/// File type cloud recordings report for video files.
pub const RECORDING_VIDEO_TYPE: &str = "MP4";

/// Which sources feed one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceSelection {
    /// Video attachments on a wiki page
    Wiki,
    /// Cloud recordings of a meeting
    Recordings,
    /// Both, publishing under the wiki page
    Both,
}

impl SourceSelection {
    pub fn uses_wiki(&self) -> bool {
        matches!(self, Self::Wiki | Self::Both)
    }

    pub fn uses_recordings(&self) -> bool {
        matches!(self, Self::Recordings | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemKind {
    WikiPage,
    Meeting,
}

/// The page or meeting whose media is processed as one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    pub kind: WorkItemKind,
    pub space_key: Option<String>,
    pub parent_id: Option<String>,
}

impl WorkItem {
    /// Directory for this work item, relative to the storage root.
    pub fn directory(&self) -> PathBuf {
        match self.kind {
            WorkItemKind::WikiPage => {
                PathBuf::from("pages").join(sanitize_file_name(&self.title.replace(' ', "_")))
            }
            WorkItemKind::Meeting => PathBuf::from("meetings").join(sanitize_file_name(&self.title)),
        }
    }
}

/// How to retrieve one attachment's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOrigin {
    WikiAttachment {
        /// Path relative to the wiki base URL.
        download_path: String,
    },
    CloudRecording {
        file_type: String,
        download_url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    /// Stable file name key.
    pub title: String,
    pub origin: MediaOrigin,
    pub size: Option<u64>,
}

impl MediaAttachment {
    pub fn source_kind(&self) -> WorkItemKind {
        match self.origin {
            MediaOrigin::WikiAttachment { .. } => WorkItemKind::WikiPage,
            MediaOrigin::CloudRecording { .. } => WorkItemKind::Meeting,
        }
    }
}

/// Whether an attachment is a video the pipeline should process.
pub fn is_video_attachment(attachment: &MediaAttachment) -> bool {
    match &attachment.origin {
        MediaOrigin::WikiAttachment { .. } => has_video_extension(&attachment.title),
        MediaOrigin::CloudRecording { file_type, .. } => {
            file_type.eq_ignore_ascii_case(RECORDING_VIDEO_TYPE)
        }
    }
}

pub fn has_video_extension(title: &str) -> bool {
    Path::new(title)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// A listing and download backend bound to one kind of container.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> WorkItemKind;

    /// Look up the container's title and grouping keys.
    async fn describe(&self, id: &str) -> Result<WorkItem>;

    /// Every attachment on the container, unfiltered, in source order.
    async fn list_media(&self, id: &str) -> Result<Vec<MediaAttachment>>;

    /// Stream the attachment's bytes to `destination`. Returns bytes written.
    async fn download(
        &self,
        attachment: &MediaAttachment,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<u64>;
}

/// Copy a response body to `destination`, flushing before returning.
pub(crate) async fn stream_to_file(
    mut response: reqwest::Response,
    destination: &Path,
    progress: &ProgressBar,
) -> Result<u64> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Download failed with status {}: {}", status, body);
    }

    if let Some(total) = response.content_length() {
        progress.set_length(total);
    }

    let mut file = tokio::fs::File::create(destination)
        .await
        .with_context(|| format!("Failed to create {}", destination.display()))?;
    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read download body")?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", destination.display()))?;
        written += chunk.len() as u64;
        progress.set_position(written);
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wiki(title: &str) -> MediaAttachment {
        MediaAttachment {
            title: title.to_string(),
            origin: MediaOrigin::WikiAttachment {
                download_path: format!("/download/attachments/1/{title}"),
            },
            size: None,
        }
    }

    fn recording(file_type: &str) -> MediaAttachment {
        MediaAttachment {
            title: "Sync_2024-01-01T10:00:00Z.mp4".to_string(),
            origin: MediaOrigin::CloudRecording {
                file_type: file_type.to_string(),
                download_url: "https://zoom.example/rec/f1".to_string(),
            },
            size: Some(10),
        }
    }

    #[test]
    fn test_video_filter_is_case_insensitive() {
        let titles = ["demo.MP4", "clip.mov", "notes.pdf", "recording.mkv"];
        let accepted: Vec<String> = titles
            .iter()
            .map(|t| wiki(t))
            .filter(is_video_attachment)
            .map(|a| a.title)
            .collect();
        assert_eq!(accepted, vec!["demo.MP4", "clip.mov", "recording.mkv"]);
    }

    #[test]
    fn test_video_filter_requires_real_extension() {
        assert!(!has_video_extension("mp4"));
        assert!(!has_video_extension("movie.mp4.txt"));
        assert!(has_video_extension("archive.2024.MkV"));
    }

    #[test]
    fn test_recording_filter_uses_file_type() {
        assert!(is_video_attachment(&recording("MP4")));
        assert!(!is_video_attachment(&recording("M4A")));
        assert!(!is_video_attachment(&recording("TRANSCRIPT")));
    }

    #[test]
    fn test_work_item_directory() {
        let page = WorkItem {
            id: "42".to_string(),
            title: "Team Sync / Q3".to_string(),
            kind: WorkItemKind::WikiPage,
            space_key: Some("ENG".to_string()),
            parent_id: None,
        };
        assert_eq!(page.directory(), PathBuf::from("pages/Team_Sync___Q3"));

        let meeting = WorkItem {
            kind: WorkItemKind::Meeting,
            title: "Weekly: planning".to_string(),
            ..page
        };
        assert_eq!(meeting.directory(), PathBuf::from("meetings/Weekly_ planning"));
    }

    #[test]
    fn test_source_selection() {
        assert!(SourceSelection::Wiki.uses_wiki());
        assert!(!SourceSelection::Wiki.uses_recordings());
        assert!(SourceSelection::Both.uses_wiki() && SourceSelection::Both.uses_recordings());
        assert!(!SourceSelection::Recordings.uses_wiki());
    }
}
