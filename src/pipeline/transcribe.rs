use tracing::warn;

use super::report::{ItemOutcome, Stage, StageReport};
use crate::store::{ArtifactKey, MediaStore, TranscriptionUnit};
use crate::transcription::{transcribe_in_order, SpeechToText};

/// Transcribe each unit into `transcripts/<stem>.txt`.
///
/// Returns the keys that have a transcript on disk afterwards.
pub async fn run(
    speech: &dyn SpeechToText,
    store: &MediaStore,
    units: &[TranscriptionUnit],
    overwrite: bool,
) -> (StageReport, Vec<ArtifactKey>) {
    let mut report = StageReport::new(Stage::Transcribe);
    let mut transcribed = Vec::with_capacity(units.len());

    for unit in units {
        let key = unit.key();
        let transcript = store.transcript(key);
        if !overwrite && transcript.path.exists() {
            report.record(key, ItemOutcome::Reused);
            transcribed.push(key.clone());
            continue;
        }

        let files: Vec<&std::path::Path> = unit
            .audio_files()
            .into_iter()
            .map(|artifact| artifact.path.as_path())
            .collect();

        let outcome = match transcribe_in_order(speech, &files).await {
            Ok(text) => match store.write_atomic(&transcript.path, text.as_bytes()) {
                Ok(()) => ItemOutcome::Completed(format!(
                    "transcribed {} file(s) with {}, {} chars",
                    files.len(),
                    speech.name(),
                    text.len()
                )),
                Err(err) => ItemOutcome::Failed(format!("{err:#}")),
            },
            Err(err) if err.is_rate_limited() => {
                warn!("Rate limit reached while transcribing {}. Please try again later.", key);
                ItemOutcome::Skipped(err.to_string())
            }
            Err(err) => ItemOutcome::Failed(err.to_string()),
        };
        report.record(key, outcome);

        // A failed regeneration leaves the previous transcript usable.
        if transcript.path.exists() {
            transcribed.push(key.clone());
        }
    }

    (report, transcribed)
}
