use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::BoundSource;
use crate::sources::{is_video_attachment, MediaAttachment};
use crate::store::{chunk_parent, ArtifactKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(Vec<MediaAttachment>),
    /// Listing succeeded but nothing was a video.
    NoneMatched { listed: usize },
}

/// List every bound source once and keep the videos, in source order.
///
/// Attachments whose stem collides with an earlier one are dropped, since
/// every later artifact is keyed by stem. So are attachments named like a
/// chunk of another attachment (`talk_part000.mp4` next to `talk.mp4`),
/// whose audio would land on that attachment's chunk path.
pub async fn discover(sources: &[BoundSource]) -> Result<Discovery> {
    let mut listed = 0;
    let mut seen = HashSet::new();
    let mut found: Vec<(ArtifactKey, MediaAttachment)> = Vec::new();

    for bound in sources {
        let attachments = bound
            .source
            .list_media(&bound.container_id)
            .await
            .with_context(|| {
                format!(
                    "Failed to list media from {} for {}",
                    bound.source.name(),
                    bound.container_id
                )
            })?;
        info!(
            "{} returned {} attachment(s) for {}",
            bound.source.name(),
            attachments.len(),
            bound.container_id
        );
        listed += attachments.len();

        for attachment in attachments {
            if !is_video_attachment(&attachment) {
                debug!("Ignoring non-video attachment {}", attachment.title);
                continue;
            }
            let key = ArtifactKey::from_title(&attachment.title);
            if !seen.insert(key.clone()) {
                warn!(
                    "Dropping {}: another attachment already maps to {}",
                    attachment.title, key
                );
                continue;
            }
            found.push((key, attachment));
        }
    }

    let found: Vec<MediaAttachment> = found
        .into_iter()
        .filter_map(|(key, attachment)| match chunk_parent(&key) {
            Some(parent) if seen.iter().any(|other| other.as_str() == parent) => {
                warn!(
                    "Dropping {}: its name collides with the chunks of {}",
                    attachment.title, parent
                );
                None
            }
            _ => Some(attachment),
        })
        .collect();

    if found.is_empty() {
        return Ok(Discovery::NoneMatched { listed });
    }
    info!("Found {} video(s):", found.len());
    for attachment in &found {
        info!("  {}", attachment.title);
    }
    Ok(Discovery::Found(found))
}
