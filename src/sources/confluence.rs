use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info, warn};

use super::{stream_to_file, MediaAttachment, MediaOrigin, MediaSource, WorkItem, WorkItemKind};
use crate::config::WikiConfig;
use crate::error::ConfigError;
use crate::publish::{PagePublisher, PublishedPage};

const ATTACHMENT_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
struct ContentResponse {
    id: String,
    title: String,
    space: Option<SpaceRef>,
    #[serde(default)]
    ancestors: Vec<AncestorRef>,
    version: Option<VersionRef>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SpaceRef {
    key: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct AncestorRef {
    id: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct VersionRef {
    number: u32,
}

#[derive(Debug, Deserialize)]
struct ContentList<T> {
    results: Vec<T>,
    #[serde(rename = "_links", default)]
    links: ListLinks,
}

#[derive(Debug, Default, Deserialize)]
struct ListLinks {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentEntry {
    title: String,
    extensions: Option<AttachmentExtensions>,
    #[serde(rename = "_links")]
    links: AttachmentLinks,
}

#[derive(Debug, Deserialize)]
struct AttachmentExtensions {
    #[serde(rename = "fileSize")]
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AttachmentLinks {
    download: String,
}

#[derive(Debug, Serialize)]
struct PageBody<'a> {
    #[serde(rename = "type")]
    content_type: &'static str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    space: Option<SpaceRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ancestors: Vec<AncestorRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<VersionRef>,
    body: StorageBody<'a>,
}

#[derive(Debug, Serialize)]
struct StorageBody<'a> {
    storage: StorageValue<'a>,
}

#[derive(Debug, Serialize)]
struct StorageValue<'a> {
    value: &'a str,
    representation: &'static str,
}

/// Confluence REST client using basic auth with an API token.
#[derive(Clone)]
pub struct ConfluenceClient {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl ConfluenceClient {
    pub fn new(base_url: &str, email: &str, api_token: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Initialized Confluence client for {}", base_url);
        Self {
            client: reqwest::Client::new(),
            base_url,
            email: email.to_string(),
            api_token: api_token.to_string(),
        }
    }

    pub fn from_config(config: &WikiConfig) -> Result<Self, ConfigError> {
        match (&config.url, &config.email, &config.api_token) {
            (Some(url), Some(email), Some(token)) => Ok(Self::new(url, email, token)),
            _ => Err(ConfigError::Missing(vec![
                crate::config::env_keys::CONFLUENCE_URL,
                crate::config::env_keys::CONFLUENCE_EMAIL,
                crate::config::env_keys::CONFLUENCE_API_TOKEN,
            ])),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.email, Some(&self.api_token))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to request {what}"))?;
        read_json(response, what).await
    }

    async fn get_page(&self, page_id: &str) -> Result<ContentResponse> {
        let url = format!(
            "{}/rest/api/content/{}?expand=space,ancestors,version",
            self.base_url, page_id
        );
        self.get_json(&url, "page").await
    }

    /// All attachments on a page, following pagination.
    pub async fn list_attachments(&self, page_id: &str) -> Result<Vec<MediaAttachment>> {
        let mut attachments = Vec::new();
        let mut start = 0usize;

        loop {
            let url = format!(
                "{}/rest/api/content/{}/child/attachment?start={}&limit={}",
                self.base_url, page_id, start, ATTACHMENT_PAGE_SIZE
            );
            let page: ContentList<AttachmentEntry> = self.get_json(&url, "attachments").await?;
            let count = page.results.len();
            debug!("Listed {} attachments at offset {}", count, start);

            attachments.extend(page.results.into_iter().map(|entry| MediaAttachment {
                title: entry.title,
                origin: MediaOrigin::WikiAttachment {
                    download_path: entry.links.download,
                },
                size: entry.extensions.and_then(|ext| ext.file_size),
            }));

            if page.links.next.is_none() || count == 0 {
                break;
            }
            start += count;
        }

        Ok(attachments)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read {what} response body"))?;

    if !status.is_success() {
        error!(
            "Confluence {} request failed with status {}: {}",
            what, status, body
        );
        return Err(anyhow!(
            "Confluence {} request failed with status {}: {}",
            what,
            status,
            body
        ));
    }

    serde_json::from_str(&body).with_context(|| format!("Failed to parse {what} response"))
}

#[async_trait]
impl MediaSource for ConfluenceClient {
    fn name(&self) -> &'static str {
        "Confluence"
    }

    fn kind(&self) -> WorkItemKind {
        WorkItemKind::WikiPage
    }

    async fn describe(&self, id: &str) -> Result<WorkItem> {
        let page = self.get_page(id).await?;
        Ok(WorkItem {
            id: page.id,
            title: page.title,
            kind: WorkItemKind::WikiPage,
            space_key: page.space.map(|space| space.key),
            parent_id: page.ancestors.last().map(|ancestor| ancestor.id.clone()),
        })
    }

    async fn list_media(&self, id: &str) -> Result<Vec<MediaAttachment>> {
        self.list_attachments(id).await
    }

    async fn download(
        &self,
        attachment: &MediaAttachment,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<u64> {
        let MediaOrigin::WikiAttachment { download_path } = &attachment.origin else {
            return Err(anyhow!(
                "{} is not a wiki attachment",
                attachment.title
            ));
        };
        let url = format!("{}{}", self.base_url, download_path);
        debug!("Downloading {} from {}", attachment.title, url);

        let response = self
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", attachment.title))?;
        stream_to_file(response, destination, progress).await
    }
}

#[async_trait]
impl PagePublisher for ConfluenceClient {
    async fn find_child_page(
        &self,
        parent: &WorkItem,
        title: &str,
    ) -> Result<Option<PublishedPage>> {
        let mut request = self
            .get(&format!("{}/rest/api/content", self.base_url))
            .query(&[
                ("title", title),
                ("type", "page"),
                ("expand", "ancestors,version"),
            ]);
        if let Some(space) = &parent.space_key {
            request = request.query(&[("spaceKey", space.as_str())]);
        }

        let response = request
            .send()
            .await
            .context("Failed to search for existing page")?;
        let found: ContentList<ContentResponse> = read_json(response, "page search").await?;

        Ok(found
            .results
            .into_iter()
            .find(|page| {
                page.title == title && page.ancestors.iter().any(|a| a.id == parent.id)
            })
            .map(|page| PublishedPage {
                id: page.id,
                title: page.title,
                version: page.version.map(|v| v.number).unwrap_or(1),
            }))
    }

    async fn create_child_page(
        &self,
        parent: &WorkItem,
        title: &str,
        storage_body: &str,
    ) -> Result<PublishedPage> {
        let body = PageBody {
            content_type: "page",
            title,
            space: parent.space_key.clone().map(|key| SpaceRef { key }),
            ancestors: vec![AncestorRef {
                id: parent.id.clone(),
            }],
            version: None,
            body: StorageBody {
                storage: StorageValue {
                    value: storage_body,
                    representation: "storage",
                },
            },
        };

        let response = self
            .client
            .post(format!("{}/rest/api/content", self.base_url))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .send()
            .await
            .context("Failed to create page")?;
        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            warn!(
                "Confluence rejected page {:?}; if a page with that title exists in the space, \
                 set publish.on_override = \"update\"",
                title
            );
        }
        let created: ContentResponse = read_json(response, "page create").await?;

        Ok(PublishedPage {
            id: created.id,
            title: created.title,
            version: created.version.map(|v| v.number).unwrap_or(1),
        })
    }

    async fn update_page(
        &self,
        page: &PublishedPage,
        storage_body: &str,
    ) -> Result<PublishedPage> {
        let body = PageBody {
            content_type: "page",
            title: &page.title,
            space: None,
            ancestors: Vec::new(),
            version: Some(VersionRef {
                number: page.version + 1,
            }),
            body: StorageBody {
                storage: StorageValue {
                    value: storage_body,
                    representation: "storage",
                },
            },
        };

        let response = self
            .client
            .put(format!("{}/rest/api/content/{}", self.base_url, page.id))
            .basic_auth(&self.email, Some(&self.api_token))
            .json(&body)
            .send()
            .await
            .context("Failed to update page")?;
        let updated: ContentResponse = read_json(response, "page update").await?;

        Ok(PublishedPage {
            id: updated.id,
            title: updated.title,
            version: updated
                .version
                .map(|v| v.number)
                .unwrap_or(page.version + 1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use tempfile::TempDir;

    fn page_item() -> WorkItem {
        WorkItem {
            id: "100".to_string(),
            title: "Sprint Review".to_string(),
            kind: WorkItemKind::WikiPage,
            space_key: Some("ENG".to_string()),
            parent_id: Some("1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_describe_reads_space_and_parent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/content/100")
            .match_query(Matcher::Any)
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .with_status(200)
            .with_body(
                r#"{"id":"100","title":"Sprint Review","space":{"key":"ENG"},
                    "ancestors":[{"id":"1"},{"id":"7"}],"version":{"number":3}}"#,
            )
            .create_async()
            .await;

        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let item = client.describe("100").await.unwrap();

        assert_eq!(item.title, "Sprint Review");
        assert_eq!(item.space_key.as_deref(), Some("ENG"));
        assert_eq!(item.parent_id.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_list_attachments_follows_pagination() {
        let mut server = Server::new_async().await;
        let _first = server
            .mock("GET", "/rest/api/content/100/child/attachment")
            .match_query(Matcher::UrlEncoded("start".into(), "0".into()))
            .with_status(200)
            .with_body(
                r#"{"results":[{"title":"demo.MP4","extensions":{"fileSize":12},
                    "_links":{"download":"/download/attachments/100/demo.MP4"}}],
                    "_links":{"next":"/rest/api/content/100/child/attachment?start=1"}}"#,
            )
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/rest/api/content/100/child/attachment")
            .match_query(Matcher::UrlEncoded("start".into(), "1".into()))
            .with_status(200)
            .with_body(
                r#"{"results":[{"title":"notes.pdf",
                    "_links":{"download":"/download/attachments/100/notes.pdf"}}],
                    "_links":{}}"#,
            )
            .create_async()
            .await;

        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let attachments = client.list_attachments("100").await.unwrap();

        let titles: Vec<&str> = attachments.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["demo.MP4", "notes.pdf"]);
        assert_eq!(attachments[0].size, Some(12));
    }

    #[tokio::test]
    async fn test_list_attachments_surfaces_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/content/100/child/attachment")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let err = client.list_attachments("100").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_download_streams_body_to_file() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/download/attachments/100/demo.mp4")
            .with_status(200)
            .with_body("video-bytes")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("demo.mp4");
        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let attachment = MediaAttachment {
            title: "demo.mp4".to_string(),
            origin: MediaOrigin::WikiAttachment {
                download_path: "/download/attachments/100/demo.mp4".to_string(),
            },
            size: None,
        };

        let written = client
            .download(&attachment, &target, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "video-bytes");
    }

    #[tokio::test]
    async fn test_find_child_page_requires_matching_parent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/api/content")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("title".into(), "demo AI Transcription Summary".into()),
                Matcher::UrlEncoded("spaceKey".into(), "ENG".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"results":[
                    {"id":"5","title":"demo AI Transcription Summary","ancestors":[{"id":"999"}]},
                    {"id":"6","title":"demo AI Transcription Summary","ancestors":[{"id":"1"},{"id":"100"}],
                     "version":{"number":4}}
                ]}"#,
            )
            .create_async()
            .await;

        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let found = client
            .find_child_page(&page_item(), "demo AI Transcription Summary")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "6");
        assert_eq!(found.version, 4);
    }

    #[tokio::test]
    async fn test_create_child_page_posts_storage_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/api/content")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "type": "page",
                "title": "demo AI Transcription Summary",
                "space": {"key": "ENG"},
                "ancestors": [{"id": "100"}],
                "body": {"storage": {"value": "<p>hi</p>", "representation": "storage"}}
            })))
            .with_status(200)
            .with_body(r#"{"id":"77","title":"demo AI Transcription Summary","version":{"number":1}}"#)
            .create_async()
            .await;

        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let page = client
            .create_child_page(&page_item(), "demo AI Transcription Summary", "<p>hi</p>")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.id, "77");
    }

    #[tokio::test]
    async fn test_create_child_page_rejected_title_is_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/api/content")
            .with_status(400)
            .with_body(
                r#"{"statusCode":400,"message":"A page with this title already exists"}"#,
            )
            .create_async()
            .await;

        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let err = client
            .create_child_page(&page_item(), "demo AI Transcription Summary", "<p>hi</p>")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_page_bumps_version() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/rest/api/content/6")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "version": {"number": 5}
            })))
            .with_status(200)
            .with_body(r#"{"id":"6","title":"demo AI Transcription Summary","version":{"number":5}}"#)
            .create_async()
            .await;

        let client = ConfluenceClient::new(&server.url(), "me@example.com", "token");
        let existing = PublishedPage {
            id: "6".to_string(),
            title: "demo AI Transcription Summary".to_string(),
            version: 4,
        };
        let updated = client.update_page(&existing, "<p>new</p>").await.unwrap();

        mock.assert_async().await;
        assert_eq!(updated.version, 5);
    }
}
