use anyhow::Context;
use tracing::warn;

use super::report::{ItemOutcome, Stage, StageReport};
use crate::store::{ArtifactKey, MediaStore};
use crate::summary::{summarize, TextGenerator};

/// Summarize each transcript into `summaries/<stem>.summary.md`.
///
/// Returns the keys that have a summary on disk afterwards.
pub async fn run(
    generator: &dyn TextGenerator,
    store: &MediaStore,
    keys: &[ArtifactKey],
    overwrite: bool,
) -> (StageReport, Vec<ArtifactKey>) {
    let mut report = StageReport::new(Stage::Summarize);
    let mut summarized = Vec::with_capacity(keys.len());

    for key in keys {
        let summary = store.summary(key);
        if !overwrite && summary.path.exists() {
            report.record(key, ItemOutcome::Reused);
            summarized.push(key.clone());
            continue;
        }

        let transcript_path = store.transcript(key).path;
        let transcript = match std::fs::read_to_string(&transcript_path)
            .with_context(|| format!("Failed to read {}", transcript_path.display()))
        {
            Ok(text) => text,
            Err(err) => {
                report.record(key, ItemOutcome::Failed(format!("{err:#}")));
                continue;
            }
        };

        let outcome = match summarize(generator, &transcript).await {
            Ok(text) => match store.write_atomic(&summary.path, text.as_bytes()) {
                Ok(()) => ItemOutcome::Completed(format!(
                    "summarized with {}, {} chars",
                    generator.name(),
                    text.len()
                )),
                Err(err) => ItemOutcome::Failed(format!("{err:#}")),
            },
            Err(err) if err.is_rate_limited() => {
                warn!("Rate limit reached while summarizing {}. Please try again later.", key);
                ItemOutcome::Skipped(err.to_string())
            }
            Err(err) => ItemOutcome::Failed(err.to_string()),
        };
        report.record(key, outcome);

        if summary.path.exists() {
            summarized.push(key.clone());
        }
    }

    (report, summarized)
}
