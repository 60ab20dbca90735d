use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{stream_to_file, MediaAttachment, MediaOrigin, MediaSource, WorkItem, WorkItemKind};
use crate::config::{env_keys, RecordingsConfig};
use crate::error::ConfigError;

/// Refresh the token this long before the server says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
struct RecordingListing {
    topic: String,
    start_time: String,
    #[serde(default)]
    recording_files: Vec<RecordingFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct RecordingFile {
    #[serde(default)]
    file_type: String,
    file_size: Option<u64>,
    #[serde(default)]
    download_url: String,
    recording_start: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Zoom cloud recordings via a server-to-server OAuth app.
pub struct ZoomClient {
    client: reqwest::Client,
    oauth_url: String,
    api_url: String,
    account_id: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
    listings: Mutex<Option<(String, RecordingListing)>>,
}

impl ZoomClient {
    pub fn new(
        oauth_url: &str,
        api_url: &str,
        account_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        info!("Initialized Zoom client for {}", api_url);
        Self {
            client: reqwest::Client::new(),
            oauth_url: oauth_url.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
            listings: Mutex::new(None),
        }
    }

    pub fn from_config(config: &RecordingsConfig) -> Result<Self, ConfigError> {
        match (&config.account_id, &config.client_id, &config.client_secret) {
            (Some(account), Some(id), Some(secret)) => Ok(Self::new(
                &config.oauth_url,
                &config.api_url,
                account,
                id,
                secret,
            )),
            _ => Err(ConfigError::Missing(vec![
                env_keys::ZOOM_ACCOUNT_ID,
                env_keys::ZOOM_CLIENT_ID,
                env_keys::ZOOM_CLIENT_SECRET,
            ])),
        }
    }

    /// Bearer token from the account-credentials grant, cached until near expiry.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Zoom access token");
        let response = self
            .client
            .post(&self.oauth_url)
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", self.account_id.as_str()),
            ])
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .await
            .context("Failed to request Zoom access token")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Zoom token response")?;
        if !status.is_success() {
            error!("Zoom token request failed with status {}: {}", status, body);
            return Err(anyhow!(
                "Zoom token request failed with status {}: {}",
                status,
                body
            ));
        }

        let token: TokenResponse =
            serde_json::from_str(&body).context("Failed to parse Zoom token response")?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn recordings(&self, meeting_id: &str) -> Result<RecordingListing> {
        let mut cache = self.listings.lock().await;
        if let Some((cached_id, listing)) = cache.as_ref() {
            if cached_id == meeting_id {
                return Ok(listing.clone());
            }
        }

        let token = self.access_token().await?;
        let url = format!("{}/meetings/{}/recordings", self.api_url, meeting_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("Failed to list Zoom recordings")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Zoom recordings response")?;
        if !status.is_success() {
            error!(
                "Zoom recordings request failed with status {}: {}",
                status, body
            );
            return Err(anyhow!(
                "Zoom recordings request failed with status {}: {}",
                status,
                body
            ));
        }

        let listing: RecordingListing =
            serde_json::from_str(&body).context("Failed to parse Zoom recordings response")?;
        *cache = Some((meeting_id.to_string(), listing.clone()));
        Ok(listing)
    }
}

/// `<topic>_<start>.mp4`, the file name a recording is stored under.
fn recording_title(listing: &RecordingListing, file: &RecordingFile) -> String {
    let start = file
        .recording_start
        .as_deref()
        .unwrap_or(&listing.start_time);
    format!(
        "{}_{}.{}",
        listing.topic,
        start,
        file.file_type.to_ascii_lowercase()
    )
}

#[async_trait]
impl MediaSource for ZoomClient {
    fn name(&self) -> &'static str {
        "Zoom"
    }

    fn kind(&self) -> WorkItemKind {
        WorkItemKind::Meeting
    }

    async fn describe(&self, id: &str) -> Result<WorkItem> {
        let listing = self.recordings(id).await?;
        Ok(WorkItem {
            id: id.to_string(),
            title: listing.topic,
            kind: WorkItemKind::Meeting,
            space_key: None,
            parent_id: None,
        })
    }

    async fn list_media(&self, id: &str) -> Result<Vec<MediaAttachment>> {
        let listing = self.recordings(id).await?;
        Ok(listing
            .recording_files
            .iter()
            .map(|file| MediaAttachment {
                title: recording_title(&listing, file),
                origin: MediaOrigin::CloudRecording {
                    file_type: file.file_type.clone(),
                    download_url: file.download_url.clone(),
                },
                size: file.file_size,
            })
            .collect())
    }

    async fn download(
        &self,
        attachment: &MediaAttachment,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<u64> {
        let MediaOrigin::CloudRecording { download_url, .. } = &attachment.origin else {
            return Err(anyhow!(
                "{} is not a cloud recording",
                attachment.title
            ));
        };
        let token = self.access_token().await?;
        debug!("Downloading recording {}", attachment.title);

        let response = self
            .client
            .get(download_url)
            .bearer_auth(&token)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", attachment.title))?;
        stream_to_file(response, destination, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::is_video_attachment;
    use mockito::{Matcher, Server, ServerGuard};

    fn client_for(server: &ServerGuard) -> ZoomClient {
        ZoomClient::new(
            &format!("{}/oauth/token", server.url()),
            &format!("{}/v2", server.url()),
            "acct",
            "client",
            "secret",
        )
    }

    async fn mock_token(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "account_credentials".into()),
                Matcher::UrlEncoded("account_id".into(), "acct".into()),
            ]))
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .with_status(200)
            .with_body(r#"{"access_token":"tok-1","expires_in":3600}"#)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let mut server = Server::new_async().await;
        let token_mock = mock_token(&mut server, 1).await;
        let client = client_for(&server);

        assert_eq!(client.access_token().await.unwrap(), "tok-1");
        assert_eq!(client.access_token().await.unwrap(), "tok-1");
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_media_names_files_after_topic_and_start() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, 1).await;
        let listing = server
            .mock("GET", "/v2/meetings/896/recordings")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_body(
                r#"{"topic":"Weekly Sync","start_time":"2024-03-01T10:00:00Z",
                    "recording_files":[
                      {"id":"a","file_type":"MP4","file_size":2048,"download_url":"https://x/a",
                       "recording_start":"2024-03-01T10:01:00Z"},
                      {"id":"b","file_type":"M4A","download_url":"https://x/b"}
                    ]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let item = client.describe("896").await.unwrap();
        let media = client.list_media("896").await.unwrap();

        listing.assert_async().await;
        assert_eq!(item.title, "Weekly Sync");
        assert_eq!(item.kind, WorkItemKind::Meeting);
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].title, "Weekly Sync_2024-03-01T10:01:00Z.mp4");
        assert_eq!(media[0].size, Some(2048));
        assert_eq!(media[1].title, "Weekly Sync_2024-03-01T10:00:00Z.m4a");
        assert!(is_video_attachment(&media[0]));
        assert!(!is_video_attachment(&media[1]));
    }

    #[tokio::test]
    async fn test_token_failure_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/oauth/token")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(r#"{"reason":"Invalid client_id or client_secret"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.access_token().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
