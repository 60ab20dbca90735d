use std::fmt;
use tracing::{error, info};

use crate::sources::WorkItem;
use crate::store::ArtifactKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Extract,
    Chunk,
    Transcribe,
    Summarize,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Chunk => "chunk",
            Self::Transcribe => "transcribe",
            Self::Summarize => "summarize",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one item in one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The stage produced a new artifact.
    Completed(String),
    /// The artifact was already present and was left alone.
    Reused,
    /// Nothing to do, or deferred to a later run. Not a failure.
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ItemReport {
    pub key: ArtifactKey,
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub items: Vec<ItemReport>,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            items: Vec::new(),
        }
    }

    /// Log the outcome as it happens and keep it for the run summary.
    pub fn record(&mut self, key: &ArtifactKey, outcome: ItemOutcome) {
        match &outcome {
            ItemOutcome::Completed(detail) => info!("[{}] {}: {}", self.stage, key, detail),
            ItemOutcome::Reused => info!("[{}] {}: already exists, skipping", self.stage, key),
            ItemOutcome::Skipped(reason) => info!("[{}] {}: skipped ({})", self.stage, key, reason),
            ItemOutcome::Failed(reason) => error!("[{}] {}: failed: {}", self.stage, key, reason),
        }
        self.items.push(ItemReport {
            key: key.clone(),
            outcome,
        });
    }

    pub fn outcome(&self, key: &ArtifactKey) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|item| &item.key == key)
            .map(|item| &item.outcome)
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Completed(_)))
    }

    pub fn reused(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Reused))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    fn count(&self, predicate: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| predicate(&item.outcome)).count()
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub work_item: WorkItem,
    /// Titles of the media that passed discovery, in source order.
    pub discovered: Vec<String>,
    pub stages: Vec<StageReport>,
}

impl RunReport {
    pub fn new(work_item: WorkItem) -> Self {
        Self {
            work_item,
            discovered: Vec::new(),
            stages: Vec::new(),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    pub fn failed(&self) -> usize {
        self.stages.iter().map(StageReport::failed).sum()
    }

    pub fn log_summary(&self) {
        if self.discovered.is_empty() {
            info!("No video attachments found for {}", self.work_item.title);
            return;
        }
        for report in &self.stages {
            info!(
                "{:>10}: {} done, {} existing, {} skipped, {} failed",
                report.stage,
                report.completed(),
                report.reused(),
                report.skipped(),
                report.failed()
            );
        }
    }
}
