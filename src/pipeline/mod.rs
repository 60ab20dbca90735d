//! Stage driver: discover, fetch, extract, chunk, transcribe, summarize, publish.
//!
//! Each stage finishes the whole batch before the next one starts. Every
//! stage checks for its own output first, so a re-run resumes wherever the
//! previous one stopped. One item failing never stops the others.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::{Config, PublishMode};
use crate::media::{AudioProfile, Transcoder};
use crate::publish::{PagePublisher, StorageFormatter};
use crate::sources::{MediaSource, WorkItemKind};
use crate::store::MediaStore;
use crate::summary::TextGenerator;
use crate::transcription::SpeechToText;

mod chunk;
mod discovery;
mod extract;
mod fetch;
mod publish;
mod report;
mod summarize;
mod transcribe;

pub use discovery::{discover, Discovery};
pub use report::{ItemOutcome, ItemReport, RunReport, Stage, StageReport};

/// A media source together with the container it lists.
pub struct BoundSource {
    pub source: Box<dyn MediaSource>,
    pub container_id: String,
}

impl BoundSource {
    pub fn new(source: Box<dyn MediaSource>, container_id: impl Into<String>) -> Self {
        Self {
            source,
            container_id: container_id.into(),
        }
    }
}

/// Deployment parameters the stages need, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub storage_root: PathBuf,
    pub audio: AudioProfile,
    pub max_upload_bytes: u64,
    pub segment_seconds: u64,
    pub title_suffix: String,
    pub publish_mode: PublishMode,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            storage_root: config.storage_root()?,
            audio: config.media.audio_profile(),
            max_upload_bytes: config.media.max_upload_bytes,
            segment_seconds: config.media.segment_seconds,
            title_suffix: config.publish.title_suffix.clone(),
            publish_mode: config.publish.on_override,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Regenerate transcripts and summaries and republish pages.
    pub overwrite: bool,
    pub show_progress: bool,
}

pub struct Pipeline {
    settings: PipelineSettings,
    sources: Vec<BoundSource>,
    transcoder: Box<dyn Transcoder>,
    speech: Box<dyn SpeechToText>,
    generator: Box<dyn TextGenerator>,
    publisher: Option<Box<dyn PagePublisher>>,
    formatter: StorageFormatter,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        transcoder: Box<dyn Transcoder>,
        speech: Box<dyn SpeechToText>,
        generator: Box<dyn TextGenerator>,
    ) -> Result<Self> {
        Ok(Self {
            settings,
            sources: Vec::new(),
            transcoder,
            speech,
            generator,
            publisher: None,
            formatter: StorageFormatter::new()?,
        })
    }

    /// Add a source. The first one added describes the work item.
    pub fn with_source(mut self, source: Box<dyn MediaSource>, container_id: &str) -> Self {
        self.sources.push(BoundSource::new(source, container_id));
        self
    }

    pub fn with_publisher(mut self, publisher: Box<dyn PagePublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let primary = self
            .sources
            .first()
            .ok_or_else(|| anyhow!("No media source configured"))?;
        let work_item = primary
            .source
            .describe(&primary.container_id)
            .await
            .with_context(|| {
                format!(
                    "Failed to look up {} in {}",
                    primary.container_id,
                    primary.source.name()
                )
            })?;
        info!("Processing \"{}\" ({})", work_item.title, work_item.id);

        let store = MediaStore::open(
            self.settings.storage_root.join(work_item.directory()),
            &self.settings.audio.container,
        )?;
        let mut report = RunReport::new(work_item);

        let attachments = match discover(&self.sources).await? {
            Discovery::Found(attachments) => attachments,
            Discovery::NoneMatched { listed } => {
                info!(
                    "No video attachments among {} listed item(s); nothing to do",
                    listed
                );
                report.log_summary();
                return Ok(report);
            }
        };
        report.discovered = attachments.iter().map(|a| a.title.clone()).collect();

        let (stage, videos) =
            fetch::run(&self.sources, &store, &attachments, options.show_progress).await;
        report.stages.push(stage);

        let (stage, keys) = extract::run(
            self.transcoder.as_ref(),
            &store,
            &videos,
            &self.settings.audio,
        )
        .await;
        report.stages.push(stage);

        let (stage, units) = chunk::run(
            self.transcoder.as_ref(),
            &store,
            &keys,
            self.settings.max_upload_bytes,
            self.settings.segment_seconds,
        )
        .await;
        report.stages.push(stage);

        let (stage, transcribed) =
            transcribe::run(self.speech.as_ref(), &store, &units, options.overwrite).await;
        report.stages.push(stage);

        let (stage, summarized) = summarize::run(
            self.generator.as_ref(),
            &store,
            &transcribed,
            options.overwrite,
        )
        .await;
        report.stages.push(stage);

        match (self.publisher.as_deref(), report.work_item.kind) {
            (Some(publisher), WorkItemKind::WikiPage) => {
                let settings = publish::PublishSettings {
                    title_suffix: &self.settings.title_suffix,
                    mode: self.settings.publish_mode,
                    overwrite: options.overwrite,
                };
                let stage = publish::run(
                    publisher,
                    &self.formatter,
                    &store,
                    &report.work_item,
                    &summarized,
                    &settings,
                )
                .await;
                report.stages.push(stage);
            }
            (None, _) => info!("Not publishing: no wiki configured for this run"),
            (Some(_), WorkItemKind::Meeting) => info!(
                "Not publishing: {} is a meeting, not a wiki page",
                report.work_item.title
            ),
        }

        report.log_summary();
        Ok(report)
    }
}
