use anyhow::Result;
use async_trait::async_trait;

use crate::sources::WorkItem;
use crate::store::ArtifactKey;

mod storage_format;

pub use storage_format::StorageFormatter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPage {
    pub id: String,
    pub title: String,
    pub version: u32,
}

/// Wiki write access for summary pages.
#[async_trait]
pub trait PagePublisher: Send + Sync {
    /// A child page of `parent` titled exactly `title`, queried live.
    async fn find_child_page(&self, parent: &WorkItem, title: &str)
        -> Result<Option<PublishedPage>>;

    async fn create_child_page(
        &self,
        parent: &WorkItem,
        title: &str,
        storage_body: &str,
    ) -> Result<PublishedPage>;

    async fn update_page(&self, page: &PublishedPage, storage_body: &str)
        -> Result<PublishedPage>;
}

/// `"<stem> <suffix>"`, e.g. `"standup AI Transcription Summary"`.
pub fn page_title(key: &ArtifactKey, suffix: &str) -> String {
    if suffix.is_empty() {
        key.to_string()
    } else {
        format!("{} {}", key, suffix)
    }
}
