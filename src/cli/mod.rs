use anyhow::{anyhow, Result};
use tracing::info;

use crate::config::Config;
use crate::media::{check_ffmpeg_available, FfmpegTranscoder};
use crate::pipeline::{Pipeline, PipelineSettings, RunOptions, RunReport};
use crate::sources::{ConfluenceClient, SourceSelection, ZoomClient};
use crate::summary::OpenAIGenerator;
use crate::transcription::provider_from_config;

mod args;

pub use args::{CheckCliArgs, Cli, CliCommand, RunCliArgs};

pub async fn handle_run_command(args: RunCliArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    config.validate(args.source)?;

    let pipeline = build_pipeline(&config, &args)?;
    let report = pipeline
        .run(RunOptions {
            overwrite: args.overwrite,
            show_progress: !args.no_progress,
        })
        .await?;

    print_report(&report);
    Ok(())
}

/// Wire real collaborators from config. Missing ids are reported before any
/// network call.
fn build_pipeline(config: &Config, args: &RunCliArgs) -> Result<Pipeline> {
    let page_id = args.page_id.as_deref();
    let meeting_id = args.meeting_id.as_deref();
    if args.source.uses_wiki() && page_id.is_none() {
        return Err(anyhow!("--page-id is required for source {:?}", args.source));
    }
    if args.source.uses_recordings() && meeting_id.is_none() {
        return Err(anyhow!(
            "--meeting-id is required for source {:?}",
            args.source
        ));
    }

    let transcoder = FfmpegTranscoder::new(config.media.ffmpeg_path.as_deref())?;
    let speech = provider_from_config(&config.openai)?;
    let generator = OpenAIGenerator::from_config(&config.openai)?;
    let mut pipeline = Pipeline::new(
        PipelineSettings::from_config(config)?,
        Box::new(transcoder),
        Box::new(speech),
        Box::new(generator),
    )?;

    if let (true, Some(page_id)) = (args.source.uses_wiki(), page_id) {
        let wiki = ConfluenceClient::from_config(&config.wiki)?;
        pipeline = pipeline
            .with_source(Box::new(wiki.clone()), page_id)
            .with_publisher(Box::new(wiki));
    }
    if let (true, Some(meeting_id)) = (args.source.uses_recordings(), meeting_id) {
        let zoom = ZoomClient::from_config(&config.recordings)?;
        pipeline = pipeline.with_source(Box::new(zoom), meeting_id);
    }

    Ok(pipeline)
}

fn print_report(report: &RunReport) {
    if report.discovered.is_empty() {
        println!("No video attachments found for {}.", report.work_item.title);
        return;
    }
    println!(
        "Processed {} video(s) for {}",
        report.discovered.len(),
        report.work_item.title
    );
    for stage in &report.stages {
        println!(
            "  {:<10} {} done, {} existing, {} skipped, {} failed",
            stage.stage.as_str(),
            stage.completed(),
            stage.reused(),
            stage.skipped(),
            stage.failed()
        );
    }
    if report.failed() > 0 {
        println!("Some items failed; re-run the same command to retry them.");
    }
}

pub fn handle_check_command(args: CheckCliArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let mut problems = Vec::new();

    match config.validate(args.source) {
        Ok(()) => println!("Configuration: ok ({})", describe_selection(args.source)),
        Err(err) => {
            println!("Configuration: {}", err);
            problems.push(err.to_string());
        }
    }

    match FfmpegTranscoder::new(config.media.ffmpeg_path.as_deref()) {
        Ok(transcoder) if check_ffmpeg_available(transcoder.binary().to_str()) => {
            println!("ffmpeg: ok ({})", transcoder.binary().display());
        }
        _ => {
            println!("ffmpeg: not found. Install it or set media.ffmpeg_path.");
            problems.push("ffmpeg not available".to_string());
        }
    }

    println!("Data directory: {}", config.storage_root()?.display());

    if problems.is_empty() {
        info!("All checks passed");
        Ok(())
    } else {
        Err(anyhow!("{} check(s) failed", problems.len()))
    }
}

fn describe_selection(selection: SourceSelection) -> &'static str {
    match selection {
        SourceSelection::Wiki => "wiki",
        SourceSelection::Recordings => "recordings",
        SourceSelection::Both => "wiki and recordings",
    }
}
