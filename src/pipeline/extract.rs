use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::report::{ItemOutcome, Stage, StageReport};
use crate::media::{AudioProfile, Transcoder};
use crate::store::{discard_partial, partial_path, ArtifactKey, LocalArtifact, MediaStore};

/// Extract audio from each video unless audio or chunks for it already exist.
///
/// Returns the keys that have audio on disk afterwards.
pub async fn run(
    transcoder: &dyn Transcoder,
    store: &MediaStore,
    videos: &[LocalArtifact],
    profile: &AudioProfile,
) -> (StageReport, Vec<ArtifactKey>) {
    let mut report = StageReport::new(Stage::Extract);
    let mut extracted = Vec::with_capacity(videos.len());

    for video in videos {
        match extract_one(transcoder, store, video, profile).await {
            Ok(outcome) => {
                report.record(&video.key, outcome);
                extracted.push(video.key.clone());
            }
            Err(err) => report.record(&video.key, ItemOutcome::Failed(format!("{err:#}"))),
        }
    }

    (report, extracted)
}

async fn extract_one(
    transcoder: &dyn Transcoder,
    store: &MediaStore,
    video: &LocalArtifact,
    profile: &AudioProfile,
) -> Result<ItemOutcome> {
    let audio = store.audio(&video.key);
    if audio.path.exists() {
        return Ok(ItemOutcome::Reused);
    }
    let chunks = store.chunks(&video.key)?;
    if !chunks.is_empty() {
        debug!("{} already split into {} chunk(s)", video.key, chunks.len());
        return Ok(ItemOutcome::Reused);
    }

    if discard_partial(&audio.path)? {
        warn!("Discarded incomplete audio for {}", video.key);
    }
    let partial = partial_path(&audio.path);
    if let Err(err) = transcoder
        .extract_audio(&video.path, &partial, profile)
        .await
    {
        discard_partial(&audio.path)?;
        return Err(err)
            .with_context(|| format!("Audio extraction failed for {}", video.path.display()));
    }

    std::fs::rename(&partial, &audio.path)
        .with_context(|| format!("Failed to move {} into place", audio.path.display()))?;
    Ok(ItemOutcome::Completed(format!(
        "extracted audio to {}",
        audio.path.display()
    )))
}
