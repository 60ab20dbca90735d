use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use super::report::{ItemOutcome, Stage, StageReport};
use crate::media::Transcoder;
use crate::store::{file_size, ArtifactKey, MediaStore, TranscriptionUnit};

const MIB: f64 = 1024.0 * 1024.0;

/// Split audio above `max_bytes` into `segment_seconds` pieces.
///
/// Returns one transcription unit per key that is ready to transcribe.
pub async fn run(
    transcoder: &dyn Transcoder,
    store: &MediaStore,
    keys: &[ArtifactKey],
    max_bytes: u64,
    segment_seconds: u64,
) -> (StageReport, Vec<TranscriptionUnit>) {
    let mut report = StageReport::new(Stage::Chunk);
    let mut units = Vec::with_capacity(keys.len());

    for key in keys {
        match chunk_one(transcoder, store, key, max_bytes, segment_seconds).await {
            Ok((outcome, unit)) => {
                report.record(key, outcome);
                units.push(unit);
            }
            Err(err) => report.record(key, ItemOutcome::Failed(format!("{err:#}"))),
        }
    }

    (report, units)
}

async fn chunk_one(
    transcoder: &dyn Transcoder,
    store: &MediaStore,
    key: &ArtifactKey,
    max_bytes: u64,
    segment_seconds: u64,
) -> Result<(ItemOutcome, TranscriptionUnit)> {
    let audio = store.audio(key);

    if !audio.path.exists() {
        let chunks = store.chunks(key)?;
        if chunks.is_empty() {
            bail!("no audio found at {}", audio.path.display());
        }
        return Ok((
            ItemOutcome::Reused,
            TranscriptionUnit::Chunked {
                key: key.clone(),
                chunks,
            },
        ));
    }

    let size = file_size(&audio.path)?;
    if size <= max_bytes {
        return Ok((
            ItemOutcome::Skipped(format!(
                "{:.1}MB is within the upload limit",
                size as f64 / MIB
            )),
            TranscriptionUnit::Whole(audio),
        ));
    }

    // Original and chunks together means a split was interrupted before cleanup.
    let stale = store.remove_chunks(key)?;
    if stale > 0 {
        warn!("Removed {} chunk(s) left by an interrupted split of {}", stale, key);
    }

    info!(
        "Audio for {} is {:.1}MB, above the {:.1}MB limit; splitting into {}s segments",
        key,
        size as f64 / MIB,
        max_bytes as f64 / MIB,
        segment_seconds
    );
    if let Err(err) = transcoder
        .segment(&audio.path, &store.chunk_pattern(key), segment_seconds)
        .await
    {
        store.remove_chunks(key)?;
        return Err(err).with_context(|| format!("Splitting {} failed", audio.path.display()));
    }

    let chunks = store.chunks(key)?;
    if chunks.is_empty() {
        bail!("splitting {} produced no chunks", audio.path.display());
    }
    std::fs::remove_file(&audio.path)
        .with_context(|| format!("Failed to remove {}", audio.path.display()))?;

    Ok((
        ItemOutcome::Completed(format!("split into {} chunk(s)", chunks.len())),
        TranscriptionUnit::Chunked {
            key: key.clone(),
            chunks,
        },
    ))
}
