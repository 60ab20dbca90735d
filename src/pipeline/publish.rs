use anyhow::{Context, Result};

use super::report::{ItemOutcome, Stage, StageReport};
use crate::config::PublishMode;
use crate::publish::{page_title, PagePublisher, StorageFormatter};
use crate::sources::WorkItem;
use crate::store::{ArtifactKey, MediaStore};

pub struct PublishSettings<'a> {
    pub title_suffix: &'a str,
    pub mode: PublishMode,
    pub overwrite: bool,
}

/// Publish each summary as a child page of `parent`.
pub async fn run(
    publisher: &dyn PagePublisher,
    formatter: &StorageFormatter,
    store: &MediaStore,
    parent: &WorkItem,
    keys: &[ArtifactKey],
    settings: &PublishSettings<'_>,
) -> StageReport {
    let mut report = StageReport::new(Stage::Publish);

    for key in keys {
        let outcome = match publish_one(publisher, formatter, store, parent, key, settings).await {
            Ok(outcome) => outcome,
            Err(err) => ItemOutcome::Failed(format!("{err:#}")),
        };
        report.record(key, outcome);
    }

    report
}

async fn publish_one(
    publisher: &dyn PagePublisher,
    formatter: &StorageFormatter,
    store: &MediaStore,
    parent: &WorkItem,
    key: &ArtifactKey,
    settings: &PublishSettings<'_>,
) -> Result<ItemOutcome> {
    let title = page_title(key, settings.title_suffix);
    let existing = publisher
        .find_child_page(parent, &title)
        .await
        .with_context(|| format!("Failed to look up page \"{}\"", title))?;
    if existing.is_some() && !settings.overwrite {
        return Ok(ItemOutcome::Skipped(format!("page \"{}\" already exists", title)));
    }

    let summary_path = store.summary(key).path;
    let markdown = std::fs::read_to_string(&summary_path)
        .with_context(|| format!("Failed to read {}", summary_path.display()))?;
    let body = formatter.convert(&markdown);

    match (existing, settings.mode) {
        (Some(page), PublishMode::Update) => {
            let updated = publisher.update_page(&page, &body).await?;
            Ok(ItemOutcome::Completed(format!(
                "updated page \"{}\" ({}) to version {}",
                updated.title, updated.id, updated.version
            )))
        }
        _ => {
            let created = publisher.create_child_page(parent, &title, &body).await?;
            Ok(ItemOutcome::Completed(format!(
                "created page \"{}\" ({})",
                created.title, created.id
            )))
        }
    }
}
