use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{debug, warn};

use super::report::{ItemOutcome, Stage, StageReport};
use super::BoundSource;
use crate::sources::{MediaAttachment, MediaSource};
use crate::store::{discard_partial, partial_path, LocalArtifact, MediaStore};

/// Download each attachment unless its video is already on disk.
///
/// Returns the videos that are present afterwards, in input order.
pub async fn run(
    sources: &[BoundSource],
    store: &MediaStore,
    attachments: &[MediaAttachment],
    show_progress: bool,
) -> (StageReport, Vec<LocalArtifact>) {
    let mut report = StageReport::new(Stage::Fetch);
    let mut videos = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        let video = store.video(&attachment.title);
        if video.path.exists() {
            report.record(&video.key, ItemOutcome::Reused);
            videos.push(video);
            continue;
        }

        let source = sources
            .iter()
            .map(|bound| bound.source.as_ref())
            .find(|source| source.kind() == attachment.source_kind());
        let result = match source {
            Some(source) => download(source, attachment, &video.path, show_progress).await,
            None => Err(anyhow!("no source can download {}", attachment.title)),
        };

        match result {
            Ok(bytes) => {
                report.record(
                    &video.key,
                    ItemOutcome::Completed(format!(
                        "downloaded {} ({:.1}MB)",
                        attachment.title,
                        bytes as f64 / (1024.0 * 1024.0)
                    )),
                );
                videos.push(video);
            }
            Err(err) => report.record(&video.key, ItemOutcome::Failed(format!("{err:#}"))),
        }
    }

    (report, videos)
}

async fn download(
    source: &dyn MediaSource,
    attachment: &MediaAttachment,
    target: &Path,
    show_progress: bool,
) -> Result<u64> {
    if discard_partial(target)? {
        warn!("Discarded incomplete download of {}", attachment.title);
    }
    let partial = partial_path(target);
    let progress = progress_bar(attachment, show_progress);

    let result = source.download(attachment, &partial, &progress).await;
    progress.finish_and_clear();

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(err) => {
            remove_partial(&partial);
            return Err(err);
        }
    };
    if let Some(expected) = attachment.size {
        if expected != bytes {
            remove_partial(&partial);
            bail!("expected {} bytes but received {}", expected, bytes);
        }
    }

    std::fs::rename(&partial, target)
        .with_context(|| format!("Failed to move {} into place", target.display()))?;
    Ok(bytes)
}

fn remove_partial(partial: &Path) {
    if let Err(err) = std::fs::remove_file(partial) {
        debug!("No partial file to remove at {}: {}", partial.display(), err);
    }
}

fn progress_bar(attachment: &MediaAttachment, show_progress: bool) -> ProgressBar {
    if !show_progress {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(attachment.size.unwrap_or(0));
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
    {
        pb.set_style(style.progress_chars("━╸━"));
    }
    pb.set_message(attachment.title.clone());
    pb
}
